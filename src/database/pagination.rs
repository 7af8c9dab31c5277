use serde::{Deserialize, Serialize};

/// One page of a windowed listing. Built from rows that carry the window
/// total (`COUNT(*) OVER ()`) in a `count` column.
#[derive(Serialize, Deserialize, Debug)]
pub struct PageContext<T> {
    pub rows: Vec<T>,
    pub total_rows: i64,
    pub next_offset: i64,
    pub prev_offset: i64,
    pub page_count: i64,
    pub message: Option<String>,
}

impl<T> PageContext<T> {
    pub fn from_rows(rows: Vec<T>, total_rows: i64, page_size: i64, current_offset: i64) -> Self {
        // An empty page past the end of a listing still reports the total.
        if total_rows == 0 {
            return Self::no_rows();
        }
        let last_offset = ((total_rows - 1) / page_size) * page_size;
        let next_offset = (current_offset + page_size).min(last_offset);
        let prev_offset = (current_offset - page_size).max(0);
        let page_count = (total_rows + page_size - 1) / page_size;

        Self {
            rows,
            total_rows,
            next_offset,
            prev_offset,
            page_count,
            message: Some(format!(
                "{} - {} / {}",
                current_offset,
                (current_offset + page_size).min(total_rows),
                total_rows
            )),
        }
    }

    pub fn no_rows() -> Self {
        Self {
            rows: vec![],
            total_rows: 0,
            next_offset: 0,
            prev_offset: 0,
            page_count: 0,
            message: Some(String::from("No results")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_listing() {
        let page: PageContext<i32> = PageContext::from_rows(vec![], 0, 6, 0);
        assert_eq!(page.total_rows, 0);
        assert_eq!(page.page_count, 0);
    }

    #[test]
    fn offsets_clamp_at_both_ends() {
        let page = PageContext::from_rows(vec![1, 2, 3, 4, 5, 6], 13, 6, 0);
        assert_eq!(page.prev_offset, 0);
        assert_eq!(page.next_offset, 6);
        assert_eq!(page.page_count, 3);

        let page = PageContext::from_rows(vec![7], 13, 6, 12);
        assert_eq!(page.prev_offset, 6);
        assert_eq!(page.next_offset, 12);
    }

    #[test]
    fn past_the_end_keeps_the_total() {
        let page: PageContext<i32> = PageContext::from_rows(vec![], 13, 6, 18);
        assert!(page.rows.is_empty());
        assert_eq!(page.total_rows, 13);
        assert_eq!(page.page_count, 3);
        assert_eq!(page.next_offset, 12);
        assert_eq!(page.prev_offset, 12);
    }

    #[test]
    fn single_page() {
        let page = PageContext::from_rows(vec![1, 2], 2, 6, 0);
        assert_eq!(page.page_count, 1);
        assert_eq!(page.next_offset, 0);
    }
}
