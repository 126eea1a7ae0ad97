//! The fixed toolkit catalog.
//!
//! Names here are what the profile analyzer may select and what a stored
//! profile lists under `Tools`. Order matters: analysis results list
//! tools in catalog order.

/// One selectable toolkit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    pub name: &'static str,
    pub description: &'static str,
}

const STANDARD: &[CatalogEntry] = &[
    CatalogEntry {
        name: "Calculator",
        description: "Calculator enables an Agent to perform mathematical calculations.",
    },
    CatalogEntry {
        name: "Exa",
        description: "ExaTools enable an Agent to search the web using Exa.",
    },
    CatalogEntry {
        name: "File",
        description: "FileTools enable an Agent to read and write files on the local file system.",
    },
    CatalogEntry {
        name: "GoogleSearch",
        description: "GoogleSearch enables an Agent to perform web crawling and scraping tasks.",
    },
    CatalogEntry {
        name: "Pandas",
        description: "PandasTools enable an Agent to perform data manipulation tasks using the Pandas library.",
    },
    CatalogEntry {
        name: "Shell",
        description: "ShellTools enable an Agent to interact with the shell to run commands.",
    },
    CatalogEntry {
        name: "Wikipedia",
        description: "WikipediaTools enable an Agent to search Wikipedia and add its contents to the knowledge base.",
    },
    CatalogEntry {
        name: "Sleep",
        description: "Tool to pause execution for a given number of seconds.",
    },
];

/// Registry of toolkit names. Built once at startup and passed to whoever needs it.
#[derive(Debug, Clone)]
pub struct ToolkitCatalog {
    entries: Vec<CatalogEntry>,
}

impl ToolkitCatalog {
    pub fn standard() -> Self {
        Self {
            entries: STANDARD.to_vec(),
        }
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|e| e.name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    /// `{"Name": "description", ...}` listing embedded in the analyzer prompt.
    pub fn render(&self) -> String {
        let body: Vec<String> = self
            .entries
            .iter()
            .map(|e| format!("'{}': '{}'", e.name, e.description))
            .collect();
        format!("{{{}}}", body.join(", "))
    }
}

impl Default for ToolkitCatalog {
    fn default() -> Self {
        Self::standard()
    }
}
