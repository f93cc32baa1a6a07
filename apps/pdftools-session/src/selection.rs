//! In-progress page selection for multi-page tools
//!
//! Pages are 1-indexed. A free-tier selection carries a cap on its size;
//! pro selections have none.

use crate::error::SelectionError;
use pdfedit_core::PdfEditError;
use std::collections::BTreeSet;

/// What [`PageSelection::select_all`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectAll {
    /// Every page is selected
    Selected,
    /// Only the first `cap` pages were selected
    Truncated,
    /// The selection was already full and has been cleared
    Cleared,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSelection {
    page_count: u32,
    cap: Option<usize>,
    selected: BTreeSet<u32>,
}

impl PageSelection {
    /// Empty selection over `page_count` pages; `cap = None` means unlimited
    pub fn new(page_count: u32, cap: Option<usize>) -> Self {
        Self {
            page_count,
            cap,
            selected: BTreeSet::new(),
        }
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    pub fn cap(&self) -> Option<usize> {
        self.cap
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn contains(&self, page: u32) -> bool {
        self.selected.contains(&page)
    }

    /// Selected pages, ascending
    pub fn pages(&self) -> Vec<u32> {
        self.selected.iter().copied().collect()
    }

    fn check_in_range(&self, page: u32) -> Result<(), SelectionError> {
        if page == 0 || page > self.page_count {
            return Err(SelectionError::OutOfRange {
                page,
                page_count: self.page_count,
            });
        }
        Ok(())
    }

    /// Flip one page. Returns whether it is selected afterwards.
    ///
    /// Adding past the cap fails and leaves the selection unchanged.
    pub fn toggle(&mut self, page: u32) -> Result<bool, SelectionError> {
        self.check_in_range(page)?;

        if self.selected.remove(&page) {
            return Ok(false);
        }

        if let Some(cap) = self.cap {
            if self.selected.len() >= cap {
                return Err(SelectionError::CapReached { cap });
            }
        }

        self.selected.insert(page);
        Ok(true)
    }

    /// The pages `select_all` selects: all of them, or the first `cap`
    fn all_allowed(&self) -> BTreeSet<u32> {
        let limit = match self.cap {
            Some(cap) => (cap as u64).min(self.page_count as u64) as u32,
            None => self.page_count,
        };
        (1..=limit).collect()
    }

    /// Select every page the cap allows, or clear if that is already the
    /// selection
    pub fn select_all(&mut self) -> SelectAll {
        let allowed = self.all_allowed();
        if !allowed.is_empty() && self.selected == allowed {
            self.selected.clear();
            return SelectAll::Cleared;
        }

        let truncated = (allowed.len() as u32) < self.page_count;
        self.selected = allowed;
        if truncated {
            SelectAll::Truncated
        } else {
            SelectAll::Selected
        }
    }

    pub fn deselect_all(&mut self) {
        self.selected.clear();
    }

    /// Replace the selection from a range string like "1-3, 5"
    ///
    /// Bounds and cap are checked before anything changes.
    pub fn set_from_ranges(&mut self, input: &str) -> Result<(), SelectionError> {
        let pages =
            pdfedit_core::parse_ranges(input, self.page_count).map_err(|e| match e {
                PdfEditError::PageOutOfRange { page, page_count } => {
                    SelectionError::OutOfRange { page, page_count }
                }
                other => SelectionError::InvalidRange(other.to_string()),
            })?;
        if let Some(cap) = self.cap {
            if pages.len() > cap {
                return Err(SelectionError::CapReached { cap });
            }
        }

        self.selected = pages.into_iter().collect();
        Ok(())
    }

    /// A delete needs at least one page selected and at least one left over
    pub fn validate_for_delete(&self) -> Result<(), SelectionError> {
        if self.selected.is_empty() {
            return Err(SelectionError::NoSelection);
        }
        if self.selected.len() as u64 >= self.page_count as u64 {
            return Err(SelectionError::WouldDeleteAll);
        }
        Ok(())
    }

    pub fn validate_for_extract(&self) -> Result<(), SelectionError> {
        if self.selected.is_empty() {
            return Err(SelectionError::NoSelection);
        }
        Ok(())
    }
}
