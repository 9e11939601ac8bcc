use std::fmt;

/// Which payload of a result a blob holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobKind {
    Body,
    Headers,
}

impl BlobKind {
    pub const ALL: [BlobKind; 2] = [BlobKind::Body, BlobKind::Headers];

    pub fn as_str(&self) -> &'static str {
        match self {
            BlobKind::Body => "body",
            BlobKind::Headers => "headers",
        }
    }
}

impl fmt::Display for BlobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Object path of one payload: `account/monitor/result/kind`
pub fn content_path(account: &str, monitor_id: &str, result_id: &str, kind: BlobKind) -> String {
    format!("{account}/{monitor_id}/{result_id}/{kind}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_path_is_account_scoped() {
        assert_eq!(content_path("acc", "mon", "res", BlobKind::Body), "acc/mon/res/body");
        assert_eq!(content_path("acc", "mon", "res", BlobKind::Headers), "acc/mon/res/headers");
        assert_ne!(
            content_path("a", "mon", "res", BlobKind::Body),
            content_path("b", "mon", "res", BlobKind::Body)
        );
    }
}
