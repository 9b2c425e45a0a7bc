use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::error::{DiscussionServerError, ServerResult};
use crate::model::{Discussion, StoreConfiguration};
use crate::reference::{DefaultReferenceResolver, ReferenceResolver};
use crate::store::Stores;

pub const DEFAULT_APPLICATION_HINT: &str = "discussions";
/// Token replaced by the URL-encoded discussion reference in livetable URL templates
pub const REFERENCE_PLACEHOLDER: &str = "__DISCUSSION_REFERENCE__";
pub const DEFAULT_URL_TEMPLATE: &str = "/discussions/__DISCUSSION_REFERENCE__";
/// Entity reference added to the filter set by `joker=true`
pub const JOKER: &str = "*";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDiscussion {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub application_hint: Option<String>,
    #[serde(default)]
    pub store_configuration_parameters: StoreConfiguration,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LivetableQuery {
    #[serde(rename = "type", default = "default_reference_type")]
    pub reference_type: String,
    /// Comma-separated entity references
    #[serde(default)]
    pub references: Option<String>,
    #[serde(default)]
    pub joker: bool,
    #[serde(rename = "reqNo", default)]
    pub req_no: u64,
    /// 1-based index of the first row
    #[serde(default)]
    pub offset: Option<usize>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(rename = "urlTemplate", default)]
    pub url_template: Option<String>,
}

fn default_reference_type() -> String {
    "user".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LivetableRow {
    pub title: String,
    #[serde(rename = "updateDate")]
    pub update_date: DateTime<Utc>,
    #[serde(rename = "messageCount")]
    pub message_count: usize,
    pub title_url: String,
    pub doc_viewable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LivetableResponse {
    #[serde(rename = "reqNo")]
    pub req_no: u64,
    pub totalrows: usize,
    pub rows: Vec<LivetableRow>,
    pub offset: usize,
    pub returnedrows: usize,
}

/// REST resource over discussions
pub struct DiscussionRest {
    stores: Stores,
    resolver: DefaultReferenceResolver,
}

impl DiscussionRest {
    pub fn new(stores: Stores) -> Self {
        Self {
            stores,
            resolver: DefaultReferenceResolver,
        }
    }

    pub fn get(&self, reference: &str) -> ServerResult<Discussion> {
        let not_found = || DiscussionServerError::discussion_not_found(reference);

        let Ok(discussion_reference) = self.resolver.resolve_discussion(reference) else {
            return Err(not_found());
        };

        match self.stores.discussions.get(&discussion_reference) {
            Ok(Some(discussion)) => Ok(discussion),
            Ok(None) => Err(not_found()),
            Err(err) => {
                error!(reference, error = %err, "failed to load discussion");
                Err(DiscussionServerError::internal(err.to_string()))
            }
        }
    }

    pub fn create(&self, request: &CreateDiscussion) -> ServerResult<Discussion> {
        let failure = || {
            DiscussionServerError::internal(format!(
                "Fail to create a discussion with title=[{}], description=[{}]",
                request.title, request.description
            ))
        };

        let hint = request
            .application_hint
            .as_deref()
            .filter(|hint| !hint.trim().is_empty())
            .unwrap_or(DEFAULT_APPLICATION_HINT);

        let created = self.stores.discussions.create(
            hint,
            &request.title,
            &request.description,
            &request.store_configuration_parameters,
        );

        let reference = match created {
            Ok(Some(reference)) => reference,
            Ok(None) => return Err(failure()),
            Err(err) => {
                error!(title = %request.title, error = %err, "failed to create discussion");
                return Err(failure());
            }
        };

        match self.stores.discussions.get(&reference) {
            Ok(Some(discussion)) => Ok(discussion),
            _ => Err(failure()),
        }
    }

    /// Paginated discussions tagged with the requested entity references.
    pub fn livetable(&self, query: &LivetableQuery) -> ServerResult<LivetableResponse> {
        let mut entities: Vec<String> = query
            .references
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|entity| !entity.is_empty())
            .map(str::to_string)
            .collect();
        if query.joker && !entities.iter().any(|entity| entity == JOKER) {
            entities.push(JOKER.to_string());
        }

        let offset = query.offset.unwrap_or(1).max(1);
        let limit = query
            .limit
            .unwrap_or(self.stores.config.livetable_page_size);
        let template = query.url_template.as_deref().unwrap_or(DEFAULT_URL_TEMPLATE);

        let discussions = &self.stores.discussions;
        let internal = |err: anyhow::Error| {
            error!(error = %err, "livetable query failed");
            DiscussionServerError::internal(err.to_string())
        };

        let totalrows = discussions
            .count_by_entity_references(&query.reference_type, &entities)
            .map_err(internal)?;
        let page = discussions
            .find_by_entity_references(&query.reference_type, &entities, offset - 1, limit)
            .map_err(internal)?;

        let references: Vec<_> = page.iter().map(|d| d.reference.clone()).collect();
        let counts = discussions.message_counts(&references).unwrap_or_else(|err| {
            warn!(error = %err, "failed to count messages");
            Default::default()
        });

        let rows: Vec<LivetableRow> = page
            .into_iter()
            .map(|discussion| LivetableRow {
                title_url: template.replace(
                    REFERENCE_PLACEHOLDER,
                    &encode_segment(&discussion.reference.to_string()),
                ),
                message_count: counts.get(&discussion.reference).copied().unwrap_or(0),
                title: discussion.title,
                update_date: discussion.update_date,
                doc_viewable: true,
            })
            .collect();

        Ok(LivetableResponse {
            req_no: query.req_no,
            totalrows,
            returnedrows: rows.len(),
            rows,
            offset,
        })
    }
}

/// Percent-encode a value for use as a single URL path segment.
pub fn encode_segment(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntityReference;
    use crate::store::CreateMessage;

    fn rest() -> (DiscussionRest, Stores) {
        let stores = Stores::in_memory().unwrap();
        (DiscussionRest::new(stores.clone()), stores)
    }

    fn create(rest: &DiscussionRest, title: &str) -> Discussion {
        rest.create(&CreateDiscussion {
            title: title.to_string(),
            description: format!("about {title}"),
            ..Default::default()
        })
        .unwrap()
    }

    fn tag(stores: &Stores, discussion: &Discussion, entity: &str) {
        let context = stores
            .contexts
            .get_or_create("forum", entity, "", &EntityReference::new("user", entity))
            .unwrap()
            .unwrap();
        stores
            .discussions
            .link(&discussion.reference, &context.reference)
            .unwrap();
    }

    #[test]
    fn test_get_missing_discussion() {
        let (rest, _) = rest();
        let err = rest.get("forum/missing").unwrap_err();
        assert_eq!(err.status, 404);
        assert_eq!(err.message, "Discussion with reference=[forum/missing] not found.");

        let err = rest.get("garbage").unwrap_err();
        assert_eq!(err.message, "Discussion with reference=[garbage] not found.");
    }

    #[test]
    fn test_create_then_get() {
        let (rest, _) = rest();
        let created = create(&rest, "Roadmap");
        assert_eq!(created.reference.application_hint(), DEFAULT_APPLICATION_HINT);

        let fetched = rest.get(&created.reference.to_string()).unwrap();
        assert_eq!(fetched, created);
    }

    #[test]
    fn test_create_failure_message() {
        let (rest, _) = rest();
        let err = rest
            .create(&CreateDiscussion {
                title: " ".into(),
                description: "desc".into(),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err.status, 500);
        assert_eq!(
            err.message,
            "Fail to create a discussion with title=[ ], description=[desc]"
        );
    }

    #[test]
    fn test_livetable_counts_and_pagination() {
        let (rest, stores) = rest();
        let a = create(&rest, "A");
        let b = create(&rest, "B");
        let c = create(&rest, "C");
        tag(&stores, &a, "alice");
        tag(&stores, &b, "alice");
        tag(&stores, &c, "*");
        stores
            .messages
            .create(CreateMessage::new("hi", "alice", a.reference.clone()))
            .unwrap();

        let query = LivetableQuery {
            reference_type: "user".into(),
            references: Some("alice".into()),
            req_no: 7,
            limit: Some(1),
            url_template: Some("/view?d=__DISCUSSION_REFERENCE__".into()),
            ..Default::default()
        };

        let exact = rest.livetable(&query).unwrap();
        assert_eq!(exact.req_no, 7);
        assert_eq!(exact.totalrows, 2);
        assert_eq!(exact.offset, 1);
        assert_eq!(exact.returnedrows, 1);
        assert_eq!(exact.rows.len(), 1);
        // the discussion that received a message was updated last
        assert_eq!(exact.rows[0].title, "A");
        assert_eq!(exact.rows[0].message_count, 1);
        assert_eq!(
            exact.rows[0].title_url,
            format!("/view?d={}", encode_segment(&a.reference.to_string()))
        );
        assert!(exact.rows[0].doc_viewable);

        let with_joker = rest
            .livetable(&LivetableQuery {
                joker: true,
                limit: Some(10),
                ..query.clone()
            })
            .unwrap();
        assert_eq!(with_joker.totalrows, 3);
        assert_eq!(with_joker.returnedrows, 3);

        let second_page = rest
            .livetable(&LivetableQuery {
                offset: Some(3),
                joker: true,
                ..query
            })
            .unwrap();
        assert_eq!(second_page.offset, 3);
        assert_eq!(second_page.returnedrows, second_page.rows.len());
        assert_eq!(second_page.returnedrows, 1);
    }

    #[test]
    fn test_livetable_offset_past_the_end() {
        let (rest, stores) = rest();
        let discussion = create(&rest, "Only");
        tag(&stores, &discussion, "alice");

        let page = rest
            .livetable(&LivetableQuery {
                reference_type: "user".into(),
                references: Some("alice".into()),
                offset: Some(usize::MAX),
                limit: Some(10),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(page.totalrows, 1);
        assert_eq!(page.offset, usize::MAX);
        assert_eq!(page.returnedrows, 0);
        assert!(page.rows.is_empty());
    }

    #[test]
    fn test_encode_segment() {
        assert_eq!(encode_segment("a b/c+d"), "a%20b%2Fc%2Bd");
    }
}
