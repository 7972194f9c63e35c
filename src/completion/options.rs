//! The `completeopt` flag set.

use crate::error::{ConfigError, Result};

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CompleteOptions: u16 {
        /// Show the menu when there are at least two matches.
        const MENU = 1;
        /// Show the menu also for a single match.
        const MENUONE = 1 << 1;
        /// Only insert the longest common text of the matches.
        const LONGEST = 1 << 2;
        /// Show extra information about the selected match.
        const PREVIEW = 1 << 3;
        /// Show extra information in a popup.
        const POPUP = 1 << 4;
        /// Do not insert any text until a match is selected.
        const NOINSERT = 1 << 5;
        /// Do not select a match in the menu.
        const NOSELECT = 1 << 6;
        /// Fuzzy filtering and score ordering.
        const FUZZY = 1 << 7;
        /// With fuzzy, keep the collection order.
        const NOSORT = 1 << 8;
        /// Order matches by distance from the cursor.
        const NEAREST = 1 << 9;
        /// Preview the rest of the selected match after the cursor.
        const PREINSERT = 1 << 10;
    }
}

impl CompleteOptions {
    /// Parse a comma separated list such as `"menu,menuone,noinsert"`.
    pub fn parse(value: &str) -> Result<Self> {
        let mut opts = CompleteOptions::empty();
        for word in value.split(',').map(str::trim).filter(|w| !w.is_empty()) {
            opts |= match word {
                "menu" => CompleteOptions::MENU,
                "menuone" => CompleteOptions::MENUONE,
                "longest" => CompleteOptions::LONGEST,
                "preview" => CompleteOptions::PREVIEW,
                "popup" => CompleteOptions::POPUP,
                "noinsert" => CompleteOptions::NOINSERT,
                "noselect" => CompleteOptions::NOSELECT,
                "fuzzy" => CompleteOptions::FUZZY,
                "nosort" => CompleteOptions::NOSORT,
                "nearest" => CompleteOptions::NEAREST,
                "preinsert" => CompleteOptions::PREINSERT,
                other => {
                    return Err(ConfigError::InvalidValue {
                        field: "completeopt".into(),
                        value: other.into(),
                    }
                    .into());
                }
            };
        }
        Ok(opts)
    }

    /// Whether a menu should be shown at all.
    pub fn menu_wanted(self) -> bool {
        self.intersects(CompleteOptions::MENU | CompleteOptions::MENUONE)
    }

    /// Whether the selected match is previewed after the cursor.
    pub fn preinsert(self) -> bool {
        self.contains(CompleteOptions::PREINSERT | CompleteOptions::MENUONE)
            && !self.contains(CompleteOptions::FUZZY)
    }

    pub fn fuzzy(self) -> bool {
        self.contains(CompleteOptions::FUZZY)
    }
}
