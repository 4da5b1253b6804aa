type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The URL is not a series page of this source.
    #[error("invalid url for {site}: {url}")]
    InvalidUrl { site: &'static str, url: String },

    /// The series page could not be fetched at all.
    #[error("fetch {url}")]
    Fetch {
        url: String,
        #[source]
        source: BoxError,
    },

    /// The series page was fetched but is not an HTML document.
    #[error("{site} response is not an html document: {url}")]
    InvalidResponse { site: &'static str, url: String },

    /// A required element is missing from an otherwise valid document.
    #[error("{site}: could not extract {field}")]
    Extraction {
        site: &'static str,
        field: &'static str,
    },

    #[error("error while retrieving chapter list")]
    ChapterListRetrieval(#[source] BoxError),
}

impl SourceError {
    pub fn fetch(url: impl Into<String>, err: anyhow::Error) -> Self {
        Self::Fetch {
            url: url.into(),
            source: err.into(),
        }
    }

    pub fn chapter_list(err: impl Into<BoxError>) -> Self {
        Self::ChapterListRetrieval(err.into())
    }

    /// Stable short name of the error kind, used in logs and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidUrl { .. } => "invalid_url",
            Self::Fetch { .. } => "fetch",
            Self::InvalidResponse { .. } => "invalid_response",
            Self::Extraction { .. } => "extraction",
            Self::ChapterListRetrieval(_) => "chapter_list_retrieval",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SourceError;

    #[test]
    fn chapter_list_error_keeps_cause_in_chain() {
        let err = SourceError::chapter_list(anyhow::anyhow!("connection reset"));
        assert_eq!(err.to_string(), "error while retrieving chapter list");
        let cause = std::error::Error::source(&err).expect("cause");
        assert_eq!(cause.to_string(), "connection reset");
        assert_eq!(err.kind(), "chapter_list_retrieval");
    }

    #[test]
    fn extraction_error_names_missing_field() {
        let err = SourceError::Extraction {
            site: "mangahere",
            field: "og:title",
        };
        assert!(err.to_string().contains("og:title"));
    }
}
