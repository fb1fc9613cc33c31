use std::cmp::Ordering;

use crate::models::{MissingStudentEntry, MissingStudentPage};

pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const MIN_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    /// Page numbers below 1 become 1; sizes are held within the allowed range.
    pub fn clamped(page: u32, page_size: u32) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE),
        }
    }

    fn bounds(&self, total: usize) -> (usize, usize) {
        let size = self.page_size as usize;
        let start = (self.page.saturating_sub(1) as usize)
            .saturating_mul(size)
            .min(total);
        let end = start.saturating_add(size).min(total);
        (start, end)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

fn by_missing_then_name(a: &MissingStudentEntry, b: &MissingStudentEntry) -> Ordering {
    b.missing_count
        .cmp(&a.missing_count)
        .then_with(|| a.student_name.cmp(&b.student_name))
        .then_with(|| a.student_id.cmp(&b.student_id))
}

/// Sorts the full collection and returns the requested slice with the unsliced total.
pub fn paginate_missing_students(
    mut entries: Vec<MissingStudentEntry>,
    request: PageRequest,
) -> MissingStudentPage {
    entries.sort_by(by_missing_then_name);
    let total = entries.len();
    let (start, end) = request.bounds(total);
    entries.truncate(end);
    let items = entries.split_off(start);

    MissingStudentPage {
        total,
        page: request.page,
        page_size: request.page_size,
        items,
    }
}
