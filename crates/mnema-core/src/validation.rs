//! Request validation.
//!
//! Every check runs before any mutation, so a rejected request leaves the
//! memory set untouched.

use crate::config::MemoryConfig;
use crate::defaults;
use crate::error::{Error, Result};
use crate::models::{AddNoteRequest, SearchRequest, UpdateNoteRequest};

/// Trim content and check it is non-empty and within the length limit.
pub fn normalize_content(content: &str, config: &MemoryConfig) -> Result<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput("content must not be empty".to_string()));
    }
    let len = trimmed.chars().count();
    if len > config.max_content_length {
        return Err(Error::InvalidInput(format!(
            "content length {} exceeds maximum of {}",
            len, config.max_content_length
        )));
    }
    Ok(trimmed.to_string())
}

/// Trim tags, drop empties, and enforce count and length limits.
pub fn normalize_tags(tags: &[String], config: &MemoryConfig) -> Result<Vec<String>> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if tag.is_empty() {
            continue;
        }
        if tag.chars().count() > config.max_tag_length {
            return Err(Error::InvalidInput(format!(
                "tag '{}' exceeds maximum length of {}",
                tag, config.max_tag_length
            )));
        }
        if !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    if out.len() > config.max_tags {
        return Err(Error::InvalidInput(format!(
            "{} tags exceeds maximum of {}",
            out.len(),
            config.max_tags
        )));
    }
    Ok(out)
}

/// Validate and normalize an add request in place.
pub fn validate_add(req: &mut AddNoteRequest, config: &MemoryConfig) -> Result<()> {
    req.content = normalize_content(&req.content, config)?;
    if let Some(tags) = &req.tags {
        req.tags = Some(normalize_tags(tags, config)?);
    }
    Ok(())
}

/// Validate and normalize an update request in place.
pub fn validate_update(req: &mut UpdateNoteRequest, config: &MemoryConfig) -> Result<()> {
    if req.is_empty() {
        return Err(Error::InvalidInput("update must change at least one field".to_string()));
    }
    if let Some(content) = &req.content {
        req.content = Some(normalize_content(content, config)?);
    }
    if let Some(tags) = &req.tags {
        req.tags = Some(normalize_tags(tags, config)?);
    }
    Ok(())
}

/// Validate a search request.
pub fn validate_search(req: &SearchRequest) -> Result<()> {
    if req.query.trim().is_empty() {
        return Err(Error::InvalidInput("query must not be empty".to_string()));
    }
    if req.limit == 0 || req.limit > defaults::SEARCH_LIMIT_MAX {
        return Err(Error::InvalidInput(format!(
            "limit must be between 1 and {}",
            defaults::SEARCH_LIMIT_MAX
        )));
    }
    if let Some(min) = req.min_similarity {
        if !(0.0..=1.0).contains(&min) {
            return Err(Error::InvalidInput(
                "min_similarity must be between 0.0 and 1.0".to_string(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_trimmed() {
        let config = MemoryConfig::default();
        assert_eq!(normalize_content("  hi \n", &config).unwrap(), "hi");
        assert!(matches!(
            normalize_content("   ", &config),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_content_length_limit() {
        let config = MemoryConfig {
            max_content_length: 5,
            ..Default::default()
        };
        assert!(normalize_content("12345", &config).is_ok());
        assert!(normalize_content("123456", &config).is_err());
    }

    #[test]
    fn test_tags_normalized() {
        let config = MemoryConfig::default();
        let tags = vec![" a ".to_string(), "".to_string(), "a".to_string(), "b".to_string()];
        assert_eq!(normalize_tags(&tags, &config).unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_tag_limits() {
        let config = MemoryConfig {
            max_tags: 2,
            max_tag_length: 3,
            ..Default::default()
        };
        let too_many: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        assert!(normalize_tags(&too_many, &config).is_err());
        assert!(normalize_tags(&["long".to_string()], &config).is_err());
    }

    #[test]
    fn test_search_limits() {
        assert!(validate_search(&SearchRequest::new("q")).is_ok());
        assert!(validate_search(&SearchRequest::new("q").with_limit(0)).is_err());
        assert!(validate_search(&SearchRequest::new("q").with_limit(101)).is_err());
        assert!(validate_search(&SearchRequest::new("q").with_limit(100)).is_ok());
        assert!(validate_search(&SearchRequest::new("q").with_min_similarity(1.5)).is_err());
        assert!(validate_search(&SearchRequest::new(" ")).is_err());
    }

    #[test]
    fn test_empty_update_rejected() {
        let mut req = UpdateNoteRequest::default();
        assert!(validate_update(&mut req, &MemoryConfig::default()).is_err());
    }
}
