//! Command guard for the shell tool.
//!
//! The agent holds a live wallet, so besides the usual destructive commands
//! the guard blocks anything that reads or copies wallet secrets (seed
//! files, wallet records, `.env`, the seed encryption key).
//!
//! Evaluation is two-phase:
//! 1. **Quick reject**: an `aho-corasick` scan for pack keywords. A command
//!    containing none of them is allowed without running any regex.
//! 2. **Pattern match**: for each pack whose keywords matched, safe patterns
//!    are tried first; if none match, the first matching destructive pattern
//!    blocks the command.
//!
//! Literal names are not enough once the shell expands globs, so every glob
//! word is also tested against the protected names (`wallet_stor*` is
//! blocked, `*.json` is not). The shell tool additionally checks what words
//! resolve to on disk.

use std::sync::LazyLock;

use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};
use regex::Regex;

use super::{PROTECTED_DIRS, PROTECTED_NAMES, SEED_SUFFIX};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Critical,
    High,
    Medium,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Critical => write!(f, "critical"),
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
        }
    }
}

/// Result of evaluating a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardVerdict {
    Allow,
    Block {
        reason: String,
        pack: String,
        severity: Severity,
    },
}

impl GuardVerdict {
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Block { .. })
    }
}

struct RuleSpec {
    name: &'static str,
    pattern: &'static str,
    reason: &'static str,
    severity: Severity,
}

struct PackSpec {
    id: &'static str,
    keywords: &'static [&'static str],
    safe: &'static [&'static str],
    rules: &'static [RuleSpec],
}

const WALLET_SECRETS: PackSpec = PackSpec {
    id: "wallet_secrets",
    keywords: &[
        "wallet_storage",
        "my_seed",
        ".seed.json",
        "wallet_ids",
        ".env",
        "seed_encryption_key",
        "printenv",
        "env",
        "export",
        "set",
    ],
    safe: &[],
    rules: &[
        RuleSpec {
            name: "wallet-files",
            pattern: r"(?i)(wallet_storage|my_seed\.json|\.seed\.json|wallet_ids\.txt)",
            reason: "Access to wallet records and seed files is not allowed from the shell",
            severity: Severity::Critical,
        },
        RuleSpec {
            name: "dotenv",
            pattern: r#"(?i)(^|[\s/'"=<>|])\.env\b"#,
            reason: "The .env file holds API and wallet secrets",
            severity: Severity::Critical,
        },
        RuleSpec {
            name: "seed-key-variable",
            pattern: r"(?i)seed_encryption_key",
            reason: "The seed encryption key must not be read",
            severity: Severity::Critical,
        },
        RuleSpec {
            name: "environment-dump",
            pattern: r"(?i)^\s*(printenv|env|export\s+-p|set)\s*($|\|)",
            reason: "Dumping the environment exposes secrets",
            severity: Severity::High,
        },
    ],
};

const FILESYSTEM: PackSpec = PackSpec {
    id: "filesystem",
    keywords: &["rm", "chmod", "chown", "dd", "mkfs", "shred", "find"],
    safe: &[r"(?i)^rm\s+[^-\s][\w./-]*$", r"(?i)^find\s+\S+\s+-name\s+\S+$"],
    rules: &[
        RuleSpec {
            name: "rm-recursive-force",
            pattern: r"(?i)\brm\s+(-[a-z]*r[a-z]*f|-[a-z]*f[a-z]*r|--recursive\s+--force|--force\s+--recursive)\b",
            reason: "Recursive force-remove",
            severity: Severity::Critical,
        },
        RuleSpec {
            name: "chmod-chown-root",
            pattern: r"(?i)\b(chmod|chown)\s+(-R\s+)?\S+\s+/(\s|$|etc|usr|var|boot)",
            reason: "Permission change on system directories",
            severity: Severity::Critical,
        },
        RuleSpec {
            name: "raw-disk",
            pattern: r"(?i)(\bdd\s+.*of\s*=\s*/dev/|\bmkfs\b|\bshred\b)",
            reason: "Overwrites disks or files irrecoverably",
            severity: Severity::Critical,
        },
        RuleSpec {
            name: "find-delete",
            pattern: r"(?i)\bfind\s+.*(-delete|-exec\s+rm)\b",
            reason: "find can recursively remove files",
            severity: Severity::High,
        },
    ],
};

const SYSTEM: PackSpec = PackSpec {
    id: "system",
    keywords: &["shutdown", "reboot", "poweroff", "halt", "kill", "crontab", "iptables", "sudo"],
    safe: &[],
    rules: &[
        RuleSpec {
            name: "power",
            pattern: r"(?i)\b(shutdown|reboot|poweroff|halt)\b",
            reason: "Stops the machine",
            severity: Severity::High,
        },
        RuleSpec {
            name: "kill-all",
            pattern: r"(?i)\b(kill\s+-9\s+-1|killall|pkill)\b",
            reason: "Force-kills processes",
            severity: Severity::Medium,
        },
        RuleSpec {
            name: "crontab-remove",
            pattern: r"(?i)\bcrontab\s+-r\b",
            reason: "Removes every cron job",
            severity: Severity::High,
        },
        RuleSpec {
            name: "firewall-flush",
            pattern: r"(?i)\biptables\s+(-F|--flush)\b",
            reason: "Drops all firewall rules",
            severity: Severity::Critical,
        },
        RuleSpec {
            name: "sudo",
            pattern: r"(?i)(^|[;&|]\s*)sudo\b",
            reason: "Privilege escalation",
            severity: Severity::High,
        },
    ],
};

const PIPED_EXEC: PackSpec = PackSpec {
    id: "piped_exec",
    keywords: &["curl", "wget", "eval", "base64"],
    safe: &[],
    rules: &[
        RuleSpec {
            name: "download-pipe-shell",
            pattern: r"(?i)\b(curl|wget)\b.*\|\s*(sudo\s+)?(sh|bash|zsh|python[23]?|perl|ruby)\b",
            reason: "Executes remote code",
            severity: Severity::Critical,
        },
        RuleSpec {
            name: "decode-pipe-shell",
            pattern: r"(?i)\bbase64\s+(-d|--decode)\b.*\|\s*(sh|bash|zsh)\b",
            reason: "Executes obfuscated code",
            severity: Severity::Critical,
        },
        RuleSpec {
            name: "eval",
            pattern: r"(?i)\beval\s+",
            reason: "eval executes arbitrary strings",
            severity: Severity::Medium,
        },
    ],
};

const PACKS: &[PackSpec] = &[WALLET_SECRETS, FILESYSTEM, SYSTEM, PIPED_EXEC];

struct Rule {
    name: &'static str,
    regex: Regex,
    reason: &'static str,
    severity: Severity,
}

struct Pack {
    id: &'static str,
    safe: Vec<Regex>,
    rules: Vec<Rule>,
}

struct Compiled {
    keywords: Option<AhoCorasick>,
    /// Pack index for each keyword pattern id.
    keyword_pack: Vec<usize>,
    packs: Vec<Pack>,
}

fn compile(pattern: &str) -> Option<Regex> {
    match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::error!(pattern, error = %e, "Skipping invalid command guard pattern");
            None
        }
    }
}

static COMPILED: LazyLock<Compiled> = LazyLock::new(|| {
    let mut keywords = Vec::new();
    let mut keyword_pack = Vec::new();
    let mut packs = Vec::new();
    for (idx, spec) in PACKS.iter().enumerate() {
        for kw in spec.keywords {
            keywords.push(*kw);
            keyword_pack.push(idx);
        }
        packs.push(Pack {
            id: spec.id,
            safe: spec.safe.iter().filter_map(|p| compile(p)).collect(),
            rules: spec
                .rules
                .iter()
                .filter_map(|r| {
                    compile(r.pattern).map(|regex| Rule {
                        name: r.name,
                        regex,
                        reason: r.reason,
                        severity: r.severity,
                    })
                })
                .collect(),
        });
    }
    let keywords = AhoCorasickBuilder::new()
        .ascii_case_insensitive(true)
        .match_kind(MatchKind::Standard)
        .build(&keywords)
        .map_err(|e| tracing::error!(error = %e, "Command guard keyword index failed to build"))
        .ok();
    Compiled {
        keywords,
        keyword_pack,
        packs,
    }
});

/// Evaluates shell commands before the shell tool runs them.
#[derive(Debug, Clone, Copy)]
pub struct CommandGuard {
    enabled: bool,
}

impl CommandGuard {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn check(&self, command: &str) -> GuardVerdict {
        if !self.enabled {
            return GuardVerdict::Allow;
        }
        let compiled = &*COMPILED;

        let mut relevant = vec![false; compiled.packs.len()];
        match &compiled.keywords {
            Some(ac) => {
                for m in ac.find_overlapping_iter(command) {
                    relevant[compiled.keyword_pack[m.pattern().as_usize()]] = true;
                }
            }
            // Without the keyword index every pack is evaluated.
            None => relevant.iter_mut().for_each(|r| *r = true),
        }

        for (pack, _) in compiled
            .packs
            .iter()
            .zip(relevant)
            .filter(|(_, is_relevant)| *is_relevant)
        {
            if pack.safe.iter().any(|re| re.is_match(command)) {
                continue;
            }
            if let Some(rule) = pack.rules.iter().find(|r| r.regex.is_match(command)) {
                tracing::info!(
                    target: "audit",
                    command_guard = "block",
                    pack = pack.id,
                    pattern = rule.name,
                    severity = %rule.severity,
                    command = truncate(command, 120),
                );
                return GuardVerdict::Block {
                    reason: rule.reason.to_string(),
                    pack: pack.id.to_string(),
                    severity: rule.severity,
                };
            }
        }

        if let Some(word) = command_words(command)
            .into_iter()
            .find(|w| glob_reaches_secrets(w))
        {
            tracing::info!(
                target: "audit",
                command_guard = "block",
                pack = WALLET_SECRETS.id,
                pattern = "secret-glob",
                glob = %word,
            );
            return GuardVerdict::Block {
                reason: format!("'{}' can expand to wallet records or seed files", word),
                pack: WALLET_SECRETS.id.to_string(),
                severity: Severity::Critical,
            };
        }

        GuardVerdict::Allow
    }
}

/// Split a command line into words the way the shell would see file
/// arguments: separators and redirections break words, quotes are dropped.
pub(crate) fn command_words(command: &str) -> Vec<String> {
    command
        .split(|c: char| c.is_whitespace() || ";|&<>()`=".contains(c))
        .map(|w| w.replace(['\'', '"'], ""))
        .filter(|w| !w.is_empty())
        .collect()
}

pub(crate) fn is_glob(word: &str) -> bool {
    word.contains(['*', '?', '['])
}

/// Whether one glob path segment names something specific, as opposed to a
/// bare wildcard or a wildcard with only an extension (`*`, `*.json`).
fn has_literal_stem(segment: &str) -> bool {
    let stem = match segment.rfind('.') {
        Some(i) if i > 0 => &segment[..i],
        _ => segment,
    };
    stem.chars().any(|c| c.is_alphanumeric() || c == '_')
}

fn glob_reaches_secrets(word: &str) -> bool {
    if !is_glob(word) {
        return false;
    }
    let sample_seed = format!("wallet{}", SEED_SUFFIX);
    word.split('/')
        .filter(|segment| is_glob(segment) && has_literal_stem(segment))
        .filter_map(|segment| glob::Pattern::new(segment).ok())
        .any(|pattern| {
            PROTECTED_DIRS
                .iter()
                .chain(PROTECTED_NAMES)
                .copied()
                .chain(std::iter::once(sample_seed.as_str()))
                .any(|name| pattern.matches(name))
        })
}

impl Default for CommandGuard {
    fn default() -> Self {
        Self::new(true)
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}
