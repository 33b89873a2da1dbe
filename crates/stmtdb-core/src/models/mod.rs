pub mod read;
pub mod write;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// A 1-based page of rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub number: u32,
    pub size: u32,
}

impl Page {
    /// Zero or missing values fall back to the defaults.
    pub fn new(number: Option<u32>, size: Option<u32>) -> Self {
        Page {
            number: number.filter(|n| *n > 0).unwrap_or(DEFAULT_PAGE),
            size: size.filter(|n| *n > 0).unwrap_or(DEFAULT_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.number - 1) * u64::from(self.size)
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.size)
    }
}

impl Default for Page {
    fn default() -> Self {
        Page::new(None, None)
    }
}

/// What a committed import wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOutcome {
    pub statement_id: String,
    pub account_id: Option<String>,
    pub accounts_created: usize,
    pub transactions_imported: usize,
}
