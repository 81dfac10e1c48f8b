//! Pagination link construction for list responses.
//!
//! Links reproduce the request's filters so a client can walk pages
//! statelessly: `prev` exists whenever the page has a non-zero offset,
//! `next` whenever the page came back full.

use std::collections::BTreeSet;

use serde::Serialize;

/// One pagination link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
    /// Relative URI of the page.
    pub href: String,
}

/// The `_links` object of a list response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PaginationLinks {
    /// Previous page, when the current offset is non-zero.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev: Option<Link>,
    /// Next page, when the current page is full.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<Link>,
}

/// Builds pagination links for a subscription list page.
#[must_use]
pub fn subscription_pagination_links(
    owning_application: Option<&str>,
    event_types: &BTreeSet<String>,
    offset: usize,
    limit: usize,
    current_page_item_count: usize,
) -> PaginationLinks {
    let prev = (offset > 0).then(|| Link {
        href: subscriptions_uri(
            owning_application,
            event_types,
            offset.saturating_sub(limit),
            limit,
        ),
    });
    let next = (current_page_item_count >= limit).then(|| Link {
        href: subscriptions_uri(owning_application, event_types, offset + limit, limit),
    });
    PaginationLinks { prev, next }
}

fn subscriptions_uri(
    owning_application: Option<&str>,
    event_types: &BTreeSet<String>,
    offset: usize,
    limit: usize,
) -> String {
    let mut uri = String::from("/subscriptions?");
    if let Some(owner) = owning_application {
        uri.push_str("owning_application=");
        uri.push_str(owner);
        uri.push('&');
    }
    for event_type in event_types {
        uri.push_str("event_type=");
        uri.push_str(event_type);
        uri.push('&');
    }
    uri.push_str(&format!("offset={offset}&limit={limit}"));
    uri
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_page_has_no_prev() {
        let links = subscription_pagination_links(None, &BTreeSet::new(), 0, 20, 20);
        assert!(links.prev.is_none());
        assert_eq!(links.next.unwrap().href, "/subscriptions?offset=20&limit=20");
    }

    #[test]
    fn test_partial_page_has_no_next() {
        let links = subscription_pagination_links(None, &BTreeSet::new(), 20, 20, 7);
        assert_eq!(links.prev.unwrap().href, "/subscriptions?offset=0&limit=20");
        assert!(links.next.is_none());
    }

    #[test]
    fn test_prev_offset_saturates_at_zero() {
        let links = subscription_pagination_links(None, &BTreeSet::new(), 5, 20, 3);
        assert_eq!(links.prev.unwrap().href, "/subscriptions?offset=0&limit=20");
    }

    #[test]
    fn test_filters_are_reproduced() {
        let event_types: BTreeSet<String> =
            ["orders".to_string(), "payments".to_string()].into_iter().collect();
        let links = subscription_pagination_links(Some("app"), &event_types, 20, 10, 10);

        let next = links.next.unwrap().href;
        assert_eq!(
            next,
            "/subscriptions?owning_application=app&event_type=orders&event_type=payments&offset=30&limit=10"
        );
    }

    #[test]
    fn test_empty_links_serialize_to_empty_object() {
        let links = subscription_pagination_links(None, &BTreeSet::new(), 0, 20, 3);
        assert_eq!(serde_json::to_string(&links).unwrap(), "{}");
    }
}
