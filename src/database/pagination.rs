use serde::{Deserialize, Serialize};

/// Page-based listing envelope. `page` is 1-based; `page_size` comes
/// from the `limit` query parameter.
#[derive(Serialize, Deserialize, Debug)]
pub struct PageContext<T> {
    pub rows: Vec<T>,
    pub total_rows: i64,
    pub page: i64,
    pub page_size: i64,
    pub page_count: i64,
}

impl<T> PageContext<T> {
    pub fn from_rows(rows: Vec<T>, total_rows: i64, page_size: i64, page: i64) -> Self {
        if rows.is_empty() {
            return Self::no_rows(page_size);
        }

        let page_count = (total_rows + page_size - 1) / page_size;

        Self {
            rows,
            total_rows,
            page,
            page_size,
            page_count,
        }
    }

    pub fn no_rows(page_size: i64) -> Self {
        Self {
            rows: vec![],
            total_rows: 0,
            page: 1,
            page_size,
            page_count: 0,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PageContext<U> {
        PageContext {
            rows: self.rows.into_iter().map(f).collect(),
            total_rows: self.total_rows,
            page: self.page,
            page_size: self.page_size,
            page_count: self.page_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn computes_page_count() {
        let page = PageContext::from_rows(vec![0; 6], 13, 6, 1);
        assert_eq!(page.page_count, 3);
        assert_eq!(page.total_rows, 13);
    }

    #[test]
    fn exact_multiple_has_no_extra_page() {
        let page = PageContext::from_rows(vec![0; 6], 12, 6, 2);
        assert_eq!(page.page_count, 2);
    }

    #[test]
    fn empty_result_collapses_to_no_rows() {
        let page: PageContext<i32> = PageContext::from_rows(vec![], 0, 6, 4);
        assert_eq!(page.page, 1);
        assert_eq!(page.total_rows, 0);
        assert_eq!(page.page_count, 0);
    }
}
