//! Upstream data access.
//!
//! Collection endpoints are paginated; pages are fetched one after another
//! until `meta.pagination` says the last page was reached. Person lookups by
//! id are split into chunks so URLs stay short.

use std::collections::HashSet;
use std::sync::Arc;

use ctl_core::SiteConfig;
use ctl_model::{ApiGroup, ApiMembership, ApiPerson, UpstreamData};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::error::{UpstreamError, UpstreamResult};
use crate::session::{login_request, login_succeeded, SessionManager};

/// Page size requested from collection endpoints.
pub const PAGE_LIMIT: u32 = 100;

/// Maximum number of person ids per request.
pub const ID_CHUNK_SIZE: usize = 10;

const GROUPS_PATH: &str = "/groups";
const MEMBERS_PATH: &str = "/groups/members";
const PERSONS_PATH: &str = "/persons";

#[derive(Debug, Deserialize)]
#[serde(bound = "T: DeserializeOwned")]
struct Page<T> {
    #[serde(default)]
    data: Vec<T>,
    #[serde(default)]
    meta: Option<PageMeta>,
}

#[derive(Debug, Deserialize)]
struct PageMeta {
    #[serde(default)]
    pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Pagination {
    current: u32,
    last_page: u32,
}

impl<T> Page<T> {
    /// Returns true if another page follows `requested`.
    ///
    /// Both the reported and the requested page must be before the last
    /// page, so a server that ignores `page` cannot keep the loop going.
    fn has_next(&self, requested: u32) -> bool {
        self.meta
            .as_ref()
            .and_then(|m| m.pagination.as_ref())
            .is_some_and(|p| p.current < p.last_page && requested < p.last_page)
    }
}

/// Splits ids into request-sized chunks.
#[must_use]
pub fn id_chunks(ids: &[i64]) -> Vec<&[i64]> {
    ids.chunks(ID_CHUNK_SIZE).collect()
}

/// Builds the URL of one page of a collection endpoint.
///
/// # Errors
///
/// Returns [`UpstreamError::InvalidUrl`] if the site URL is malformed.
pub fn page_url(
    site: &SiteConfig,
    path: &str,
    ids: Option<&[i64]>,
    params: &[(&str, &str)],
    page: u32,
) -> UpstreamResult<String> {
    let mut url = Url::parse(&site.upstream.api_url(path))?;
    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("page", &page.to_string())
            .append_pair("limit", &PAGE_LIMIT.to_string());
        for (key, value) in params {
            query.append_pair(key, value);
        }
        for id in ids.unwrap_or_default() {
            query.append_pair("ids[]", &id.to_string());
        }
    }
    Ok(url.into())
}

/// Reads persons, groups and memberships of a site.
#[derive(Debug, Clone)]
pub struct UpstreamService {
    sessions: Arc<SessionManager>,
}

impl UpstreamService {
    /// Creates a service on top of a session manager.
    #[must_use]
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self { sessions }
    }

    /// The underlying session manager.
    #[must_use]
    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Fetches every page of a collection endpoint, in order.
    ///
    /// # Errors
    ///
    /// Returns the first request or decode error; pages fetched before it are
    /// discarded.
    pub async fn fetch_paginated<T: DeserializeOwned>(
        &self,
        site: &SiteConfig,
        path: &str,
        ids: Option<&[i64]>,
        params: &[(&str, &str)],
    ) -> UpstreamResult<Vec<T>> {
        let mut records = Vec::new();
        let mut page = 1;

        loop {
            let url = page_url(site, path, ids, params, page)?;
            let body = self.sessions.authenticated_get(&url, site).await?;
            let result: Page<T> = serde_json::from_value(body)
                .map_err(|e| UpstreamError::decode(format!("{path} page {page}: {e}")))?;
            let has_next = result.has_next(page);
            records.extend(result.data);
            if !has_next {
                break;
            }
            page += 1;
        }

        tracing::debug!(site = %site.name, path, pages = page, records = records.len(), "Fetched collection");
        Ok(records)
    }

    /// Fetches exported groups.
    ///
    /// Hidden groups and groups matched by a configured filter are skipped.
    ///
    /// # Errors
    ///
    /// Returns the first request or decode error.
    pub async fn groups(&self, site: &SiteConfig) -> UpstreamResult<Vec<ApiGroup>> {
        let groups: Vec<ApiGroup> = self.fetch_paginated(site, GROUPS_PATH, None, &[]).await?;
        Ok(groups
            .into_iter()
            .filter(|group| {
                if group.is_hidden() {
                    return false;
                }
                !group
                    .id
                    .is_some_and(|id| site.groups.excludes(id, group.group_type_id()))
            })
            .collect())
    }

    /// Fetches memberships, optionally limited to some groups.
    ///
    /// # Errors
    ///
    /// Returns the first request or decode error.
    pub async fn group_memberships(
        &self,
        site: &SiteConfig,
        group_ids: Option<&[i64]>,
    ) -> UpstreamResult<Vec<ApiMembership>> {
        self.fetch_paginated(site, MEMBERS_PATH, group_ids, &[("with_deleted", "false")])
            .await
    }

    /// Returns the distinct ids of persons in the configured user groups, in
    /// first-seen order.
    ///
    /// # Errors
    ///
    /// Returns the first request or decode error.
    pub async fn persons_in_groups(&self, site: &SiteConfig) -> UpstreamResult<Vec<i64>> {
        let memberships = self
            .group_memberships(site, site.users.group_ids.as_deref())
            .await?;
        let mut seen = HashSet::new();
        Ok(memberships
            .into_iter()
            .map(|m| m.person_id)
            .filter(|id| seen.insert(*id))
            .collect())
    }

    /// Fetches persons, either all of them or the given ids.
    ///
    /// Ids are requested in chunks of [`ID_CHUNK_SIZE`]. With departments
    /// configured, persons outside all of them are dropped.
    ///
    /// # Errors
    ///
    /// Returns the first request or decode error.
    pub async fn persons(&self, site: &SiteConfig, ids: Option<&[i64]>) -> UpstreamResult<Vec<ApiPerson>> {
        let chunks = match ids {
            Some(ids) => id_chunks(ids).into_iter().map(Some).collect(),
            None => vec![None],
        };

        let mut persons = Vec::new();
        for chunk in chunks {
            let fetched: Vec<ApiPerson> = self.fetch_paginated(site, PERSONS_PATH, chunk, &[]).await?;
            persons.extend(fetched.into_iter().filter(|person| {
                site.departments
                    .as_deref()
                    .map_or(true, |departments| person.in_any_department(departments))
            }));
        }
        Ok(persons)
    }

    /// Fetches a single person.
    ///
    /// # Errors
    ///
    /// Returns the request error, or a decode error if the response has no
    /// person.
    pub async fn person(&self, site: &SiteConfig, id: i64) -> UpstreamResult<ApiPerson> {
        let url = site.upstream.api_url(&format!("{PERSONS_PATH}/{id}"));
        let mut body = self.sessions.authenticated_get(&url, site).await?;
        let data = body
            .get_mut("data")
            .map(Value::take)
            .ok_or_else(|| UpstreamError::decode(format!("person {id}: response has no data")))?;
        serde_json::from_value(data).map_err(|e| UpstreamError::decode(format!("person {id}: {e}")))
    }

    /// Checks a user's credentials against the upstream login.
    ///
    /// Does not touch the site's session.
    ///
    /// # Errors
    ///
    /// Returns transport errors and non-auth HTTP errors; a rejected login is
    /// `Ok(false)`.
    pub async fn authenticate(&self, site: &SiteConfig, user: &str, password: &str) -> UpstreamResult<bool> {
        tracing::debug!(site = %site.name, user, "Delegated authentication");
        let response = self
            .sessions
            .transport()
            .send(login_request(&site.upstream, user, password))
            .await?;
        if response.is_auth_rejection() {
            return Ok(false);
        }
        let response = response.error_for_status()?;
        Ok(login_succeeded(&response.body))
    }

    /// Fetches everything one sync cycle needs.
    ///
    /// # Errors
    ///
    /// Returns the first error of any fetch.
    pub async fn fetch_site_data(&self, site: &SiteConfig) -> UpstreamResult<UpstreamData> {
        tracing::info!(site = %site.name, "Fetching groups");
        let groups = self.groups(site).await?;

        tracing::info!(site = %site.name, "Fetching group memberships");
        let memberships = self.group_memberships(site, None).await?;

        tracing::info!(site = %site.name, "Fetching persons");
        let person_ids = match &site.users.group_ids {
            Some(_) => Some(self.persons_in_groups(site).await?),
            None => None,
        };
        let persons = self.persons(site, person_ids.as_deref()).await?;

        Ok(UpstreamData {
            groups,
            persons,
            memberships,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::testing::{site, site_with, FakeTransport};
    use crate::transport::UpstreamResponse;

    fn service(transport: &Arc<FakeTransport>) -> UpstreamService {
        UpstreamService::new(Arc::new(SessionManager::new(transport.clone())))
    }

    fn page(data: Value, current: u32, last: u32) -> UpstreamResponse {
        UpstreamResponse::new(
            200,
            json!({"data": data, "meta": {"pagination": {"current": current, "lastPage": last}}}),
        )
    }

    #[test]
    fn chunks_cover_all_ids() {
        for (n, expected) in [(0usize, 0usize), (10, 1), (11, 2), (25, 3)] {
            let ids: Vec<i64> = (0..n as i64).collect();
            let chunks = id_chunks(&ids);
            assert_eq!(chunks.len(), expected, "{n} ids");
            assert!(chunks.iter().all(|c| c.len() <= ID_CHUNK_SIZE));
            assert_eq!(chunks.concat(), ids);
        }
    }

    #[test]
    fn page_url_has_paging_params_and_ids() {
        let url = page_url(&site("a"), MEMBERS_PATH, Some(&[3, 4]), &[("with_deleted", "false")], 2)
            .unwrap();
        assert_eq!(
            url,
            "https://a.church.tools/api/groups/members?page=2&limit=100&with_deleted=false&ids%5B%5D=3&ids%5B%5D=4"
        );
    }

    #[tokio::test]
    async fn single_page_without_pagination_meta() {
        let transport = Arc::new(FakeTransport::default());
        transport.push_data(UpstreamResponse::new(200, json!({"data": [{"personId": 1, "groupId": 2}]})));

        let memberships = service(&transport).group_memberships(&site("a"), None).await.unwrap();

        assert_eq!(memberships, vec![ApiMembership::new(1, 2)]);
        assert_eq!(transport.data_calls(), 1);
    }

    #[tokio::test]
    async fn pages_are_concatenated_in_order() {
        let transport = Arc::new(FakeTransport::default());
        transport.push_data(page(json!([{"personId": 1, "groupId": 9}]), 1, 3));
        transport.push_data(page(json!([{"personId": 2, "groupId": 9}]), 2, 3));
        transport.push_data(page(json!([{"personId": 3, "groupId": 9}]), 3, 3));

        let memberships = service(&transport).group_memberships(&site("a"), None).await.unwrap();

        let ids: Vec<_> = memberships.iter().map(|m| m.person_id).collect();
        assert_eq!(ids, [1, 2, 3]);
        let urls = transport.data_urls();
        assert!(urls[0].contains("page=1&"));
        assert!(urls[2].contains("page=3&"));
    }

    #[tokio::test]
    async fn paging_stops_at_last_page_when_server_repeats_itself() {
        let transport = Arc::new(FakeTransport::default());
        for person in 1..=3 {
            transport.push_data(page(json!([{"personId": person, "groupId": 9}]), 1, 2));
        }

        let memberships = service(&transport).group_memberships(&site("a"), None).await.unwrap();

        assert_eq!(memberships.len(), 2);
        assert_eq!(transport.data_calls(), 2);
    }

    #[tokio::test]
    async fn groups_skip_hidden_and_filtered() {
        let transport = Arc::new(FakeTransport::default());
        transport.push_data(UpstreamResponse::new(
            200,
            json!({"data": [
                {"id": 1, "name": "Visible", "information": {"groupTypeId": 1}},
                {"id": 2, "name": "Hidden", "settings": {"visibility": "hidden"}},
                {"id": 3, "name": "Typed", "information": {"groupTypeId": 3}},
                {"id": 99, "name": "ById", "information": {"groupTypeId": 1}}
            ]}),
        ));
        let site = site_with(
            "a",
            r#"
            [[sites.groups.filter]]
            type = 3
            [[sites.groups.filter]]
            id = 99
            "#,
        );

        let groups = service(&transport).groups(&site).await.unwrap();

        let names: Vec<_> = groups.iter().filter_map(|g| g.name.as_deref()).collect();
        assert_eq!(names, ["Visible"]);
    }

    #[tokio::test]
    async fn persons_are_fetched_in_chunks_and_filtered_by_department() {
        let transport = Arc::new(FakeTransport::default());
        transport.push_data(UpstreamResponse::new(
            200,
            json!({"data": [
                {"id": 1, "departmentIds": [1]},
                {"id": 2, "departmentIds": [5]}
            ]}),
        ));
        transport.push_data(UpstreamResponse::new(200, json!({"data": [{"id": 11, "departmentIds": [2]}]})));
        let site = site_with("a", "departments = [1, 2]");
        let ids: Vec<i64> = (1..=11).collect();

        let persons = service(&transport).persons(&site, Some(&ids)).await.unwrap();

        let ids: Vec<_> = persons.iter().filter_map(|p| p.id).collect();
        assert_eq!(ids, [1, 11]);
        let urls = transport.data_urls();
        assert_eq!(urls.len(), 2);
        assert_eq!(urls[0].matches("ids%5B%5D=").count(), 10);
        assert_eq!(urls[1].matches("ids%5B%5D=").count(), 1);
    }

    #[tokio::test]
    async fn no_ids_means_no_person_requests() {
        let transport = Arc::new(FakeTransport::default());

        let persons = service(&transport).persons(&site("a"), Some(&[])).await.unwrap();

        assert!(persons.is_empty());
        assert_eq!(transport.data_calls(), 0);
    }

    #[tokio::test]
    async fn persons_in_groups_are_distinct() {
        let transport = Arc::new(FakeTransport::default());
        transport.push_data(UpstreamResponse::new(
            200,
            json!({"data": [
                {"personId": 4, "groupId": 10},
                {"personId": 5, "groupId": 10},
                {"personId": 4, "groupId": 11}
            ]}),
        ));
        let site = site_with("a", "[sites.users]\ngroup_ids = [10, 11]");

        let ids = service(&transport).persons_in_groups(&site).await.unwrap();

        assert_eq!(ids, [4, 5]);
        assert!(transport.data_urls()[0].contains("ids%5B%5D=10&ids%5B%5D=11"));
    }

    #[tokio::test]
    async fn person_by_id() {
        let transport = Arc::new(FakeTransport::default());
        transport.push_data(UpstreamResponse::new(200, json!({"data": {"id": 7, "firstName": "Eva"}})));

        let person = service(&transport).person(&site("a"), 7).await.unwrap();

        assert_eq!(person.first_name.as_deref(), Some("Eva"));
        assert_eq!(transport.data_urls(), ["https://a.church.tools/api/persons/7"]);
    }

    #[tokio::test]
    async fn authenticate_maps_rejection_to_false() {
        let transport = Arc::new(FakeTransport::default());
        let service = service(&transport);
        let site = site("a");

        assert!(service.authenticate(&site, "guid-1", "secret").await.unwrap());

        transport.push_login(UpstreamResponse::new(401, Value::Null));
        assert!(!service.authenticate(&site, "guid-1", "wrong").await.unwrap());

        let login = &transport.requests()[1];
        assert_eq!(login.body.as_ref().and_then(|b| b.get("username")), Some(&json!("guid-1")));
        assert_eq!(service.sessions().get_connection("a").failures(), 0);
    }

    #[tokio::test]
    async fn fetch_site_data_limits_persons_to_user_groups() {
        let transport = Arc::new(FakeTransport::default());
        transport.push_data(UpstreamResponse::new(200, json!({"data": [{"id": 10, "name": "Team"}]})));
        transport.push_data(UpstreamResponse::new(
            200,
            json!({"data": [{"personId": 4, "groupId": 10}, {"personId": 5, "groupId": 12}]}),
        ));
        transport.push_data(UpstreamResponse::new(200, json!({"data": [{"personId": 4, "groupId": 10}]})));
        transport.push_data(UpstreamResponse::new(200, json!({"data": [{"id": 4}]})));
        let site = site_with("a", "[sites.users]\ngroup_ids = [10]");

        let data = service(&transport).fetch_site_data(&site).await.unwrap();

        assert_eq!(data.groups.len(), 1);
        assert_eq!(data.memberships.len(), 2);
        assert_eq!(data.persons.len(), 1);
        let urls = transport.data_urls();
        assert_eq!(urls.len(), 4);
        assert!(urls[3].contains("ids%5B%5D=4"));
        assert!(!urls[3].contains("ids%5B%5D=5"));
    }
}
