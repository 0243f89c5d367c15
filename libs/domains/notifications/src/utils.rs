//! Small parsing helpers shared by the configuration grammars and the webhook method.

use std::collections::BTreeSet;

use crate::error::{NotificationError, NotificationResult};
use crate::models::Recipient;

/// Split `s` on the first occurrence of `delim`.
///
/// Only the first delimiter counts; the suffix may contain more of them.
pub fn split_string_by(s: &str, delim: char) -> NotificationResult<(&str, &str)> {
    s.split_once(delim)
        .ok_or_else(|| NotificationError::parse(s, delim))
}

/// Split a webhook config of the form `url|Header=value|Header2=value`.
pub fn parse_webhook_config(config: &str) -> NotificationResult<(String, Vec<(String, String)>)> {
    match config.split_once('|') {
        Some((url, header_conf)) => Ok((url.to_string(), parse_header_conf(header_conf)?)),
        None => Ok((config.to_string(), Vec::new())),
    }
}

/// Parse `Name=value|Other=value` into header pairs.
///
/// Header names are case-insensitive; a later assignment replaces an earlier
/// one, taking the later spelling of the name.
pub fn parse_header_conf(header_conf: &str) -> NotificationResult<Vec<(String, String)>> {
    let mut headers: Vec<(String, String)> = Vec::new();

    for assignment in header_conf.split('|').filter(|s| !s.is_empty()) {
        let (name, value) = assignment
            .split_once('=')
            .filter(|(name, _)| !name.is_empty())
            .ok_or_else(|| NotificationError::InvalidHeader(assignment.to_string()))?;

        headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
        headers.push((name.to_string(), value.to_string()));
    }

    Ok(headers)
}

/// Return the recipients whose names appear in `names`. Unknown names are ignored.
pub fn find_subscribers<'a, I, S>(recipients: I, names: &[S]) -> BTreeSet<Recipient>
where
    I: IntoIterator<Item = &'a Recipient>,
    S: AsRef<str>,
{
    recipients
        .into_iter()
        .filter(|recipient| names.iter().any(|name| name.as_ref() == recipient.name()))
        .cloned()
        .collect()
}
