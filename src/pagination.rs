use serde::Deserialize;

pub const DEFAULT_LIMIT: i64 = 20;
pub const MAX_LIMIT: i64 = 100;

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl Pagination {
    /// Limit in `1..=MAX_LIMIT`, offset never negative.
    pub fn clamped(self) -> Self {
        Self {
            limit: self.limit.clamp(1, MAX_LIMIT),
            offset: self.offset.max(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_out_of_range_values() {
        let p = Pagination { limit: 5000, offset: -3 }.clamped();
        assert_eq!((p.limit, p.offset), (MAX_LIMIT, 0));
        let p = Pagination { limit: 0, offset: 7 }.clamped();
        assert_eq!((p.limit, p.offset), (1, 7));
    }
}
