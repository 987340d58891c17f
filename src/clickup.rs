use async_trait::async_trait;
use log::{debug, info};
use reqwest::{header::AUTHORIZATION, header::CONTENT_TYPE, Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::config::Config;
use crate::error::{Result, TrackerError};
use crate::hierarchy::{Hierarchy, NodeKind};
use crate::models::{
    CreateTimeEntryParams, NamedRef, RawTimeReport, StartTimerParams, Task, TaskDetail, TimeEntry,
    TimeEntryFilter, User,
};
use crate::period::TimeRange;
use crate::repository::WorkspaceRepository;

/// task一覧の1ページあたりの件数。
const TASKS_PAGE_SIZE: usize = 100;

/// ClickUp APIのid, nameを持つオブジェクトをデシリアライズするための構造体。
#[derive(Debug, Deserialize)]
struct ClickUpRef {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct ClickUpId {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SpacesResponse {
    spaces: Vec<ClickUpRef>,
}

#[derive(Debug, Deserialize)]
struct ClickUpFolder {
    id: String,
    name: String,
    #[serde(default)]
    lists: Vec<ClickUpRef>,
}

#[derive(Debug, Deserialize)]
struct FoldersResponse {
    folders: Vec<ClickUpFolder>,
}

#[derive(Debug, Deserialize)]
struct ListsResponse {
    lists: Vec<ClickUpRef>,
}

#[derive(Debug, Deserialize)]
struct TasksResponse {
    tasks: Vec<ClickUpRef>,
    #[serde(default)]
    last_page: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct ClickUpTask {
    id: String,
    name: String,
    list: ClickUpRef,
    space: ClickUpId,
}

#[derive(Debug, Deserialize)]
struct ClickUpUser {
    #[serde(deserialize_with = "string_or_number")]
    id: String,
    username: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClickUpTag {
    name: String,
}

/// ClickUp APIのtime entryをデシリアライズするための構造体。
///
/// 時刻と経過時間は文字列で返るが、数値で返るエンドポイントもある。
#[derive(Debug, Deserialize)]
struct ClickUpTimeEntry {
    #[serde(deserialize_with = "string_or_number")]
    id: String,
    #[serde(default)]
    task: Option<ClickUpRef>,
    #[serde(default)]
    user: Option<ClickUpUser>,
    #[serde(deserialize_with = "string_or_number")]
    start: String,
    #[serde(default, deserialize_with = "optional_string_or_number")]
    end: Option<String>,
    #[serde(default, deserialize_with = "optional_string_or_number")]
    duration: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    billable: bool,
    #[serde(default)]
    tags: Vec<ClickUpTag>,
}

impl From<ClickUpTimeEntry> for TimeEntry {
    fn from(entry: ClickUpTimeEntry) -> Self {
        TimeEntry {
            id: entry.id,
            task: entry.task.map(|task| NamedRef {
                id: task.id,
                name: task.name,
            }),
            user: entry.user.map(|user| User {
                id: user.id,
                username: user.username,
                email: user.email,
            }),
            start: entry.start,
            end: entry.end.filter(|end| !end.is_empty()),
            duration: entry.duration.unwrap_or_else(|| "0".to_string()),
            description: entry.description.unwrap_or_default(),
            billable: entry.billable,
            tags: entry.tags.into_iter().map(|tag| tag.name).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ClickUpMember {
    user: ClickUpUser,
}

#[derive(Debug, Deserialize)]
struct ClickUpTeam {
    #[serde(deserialize_with = "string_or_number")]
    id: String,
    #[serde(default)]
    members: Vec<ClickUpMember>,
}

#[derive(Debug, Deserialize)]
struct TeamsResponse {
    teams: Vec<ClickUpTeam>,
}

#[derive(Debug, Deserialize)]
struct TimeEntriesResponse {
    data: Vec<ClickUpTimeEntry>,
}

#[derive(Debug, Deserialize)]
struct TimeEntryResponse {
    data: Option<ClickUpTimeEntry>,
}

#[derive(Debug, Serialize)]
struct TagBody<'a> {
    name: &'a str,
}

#[derive(Debug, Serialize)]
struct StartTimerBody<'a> {
    tid: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    billable: bool,
    tags: Vec<TagBody<'a>>,
}

#[derive(Debug, Serialize)]
struct CreateTimeEntryBody<'a> {
    tid: &'a str,
    start: i64,
    duration: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    billable: bool,
    tags: Vec<TagBody<'a>>,
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}

fn optional_string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::String(s) => Ok(Some(s)),
        serde_json::Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}

/// ClickUp APIと通信するためのクライアント。
///
/// # Examples
///
/// ```
/// let client = ClickUpClient::new(&Config::from_env()?);
/// let tree = client.fetch_workspace_hierarchy().await?;
/// ```
pub struct ClickUpClient {
    client: Client,
    api_url: String,
    api_token: String,
    team_id: String,
}

impl ClickUpClient {
    /// 新しい`ClickUpClient`を返す。
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
            team_id: config.team_id.clone(),
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.api_url, path))
            .header(AUTHORIZATION, &self.api_token)
            .header(CONTENT_TYPE, "application/json")
    }

    /// リクエストを送信し、レスポンスをデシリアライズする。
    ///
    /// 2xx以外のステータスはレスポンス本文をメッセージとした`Upstream`エラーにする。
    async fn send<R: DeserializeOwned>(&self, request: RequestBuilder) -> Result<R> {
        let response = request.send().await?;
        let status = response.status();
        debug!("{} {}", status, response.url().path());

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TrackerError::Upstream {
                status: Some(status.as_u16()),
                message: if body.is_empty() {
                    status.to_string()
                } else {
                    body
                },
            });
        }

        Ok(response.json::<R>().await?)
    }

    async fn get<R: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<R> {
        self.send(self.request(Method::GET, path).query(query)).await
    }

    /// workspaceのメンバーのidを返す。
    async fn fetch_member_ids(&self) -> Result<Vec<String>> {
        let response: TeamsResponse = self.get("/team", &[]).await?;
        let team = response
            .teams
            .into_iter()
            .find(|team| team.id == self.team_id)
            .ok_or_else(|| {
                TrackerError::upstream(format!("Team {} is not accessible", self.team_id))
            })?;

        Ok(team.members.into_iter().map(|member| member.user.id).collect())
    }

    async fn fetch_space_name(&self, space_id: &str) -> Result<String> {
        let space: ClickUpRef = self.get(&format!("/space/{}", space_id), &[]).await?;
        Ok(space.name)
    }
}

#[async_trait]
impl WorkspaceRepository for ClickUpClient {
    async fn fetch_workspace_hierarchy(&self) -> Result<Hierarchy> {
        let archived = [("archived", "false".to_string())];
        let spaces: SpacesResponse = self
            .get(&format!("/team/{}/space", self.team_id), &archived)
            .await?;

        let mut tree = Hierarchy::new();
        let root = tree.root();
        for space in spaces.spaces {
            let folders: FoldersResponse = self
                .get(&format!("/space/{}/folder", space.id), &archived)
                .await?;
            let lists: ListsResponse = self
                .get(&format!("/space/{}/list", space.id), &archived)
                .await?;

            let space_node = tree.add_child(root, space.id, space.name, NodeKind::Space);
            for folder in folders.folders {
                let folder_node = tree.add_child(space_node, folder.id, folder.name, NodeKind::Folder);
                for list in folder.lists {
                    tree.add_child(folder_node, list.id, list.name, NodeKind::List);
                }
            }
            for list in lists.lists {
                tree.add_child(space_node, list.id, list.name, NodeKind::List);
            }
        }
        info!("Fetched workspace hierarchy with {} nodes", tree.len());

        Ok(tree)
    }

    async fn fetch_tasks_in_list(&self, list_id: &str) -> Result<Vec<Task>> {
        let mut tasks = Vec::new();
        let mut page = 0;
        loop {
            let response: TasksResponse = self
                .get(
                    &format!("/list/{}/task", list_id),
                    &[("archived", "false".to_string()), ("page", page.to_string())],
                )
                .await?;
            let fetched = response.tasks.len();
            tasks.extend(response.tasks.into_iter().map(|task| Task {
                id: task.id,
                name: task.name,
            }));

            let last_page = response
                .last_page
                .unwrap_or(fetched < TASKS_PAGE_SIZE);
            if fetched == 0 || last_page {
                break;
            }
            page += 1;
        }
        debug!("length of tasks in list {}: {}", list_id, tasks.len());

        Ok(tasks)
    }

    async fn fetch_task_detail(&self, task_id: &str) -> Result<TaskDetail> {
        let task: ClickUpTask = self.get(&format!("/task/{}", task_id), &[]).await?;
        let space_name = self.fetch_space_name(&task.space.id).await?;

        Ok(TaskDetail {
            id: task.id,
            name: task.name,
            list: NamedRef {
                id: task.list.id,
                name: task.list.name,
            },
            space: NamedRef {
                id: task.space.id,
                name: space_name,
            },
        })
    }

    async fn fetch_time_report(&self, range: &TimeRange) -> Result<RawTimeReport> {
        let entries = self
            .fetch_time_entries(&TimeEntryFilter {
                task_id: None,
                range: *range,
            })
            .await?;

        RawTimeReport::from_entries(&entries)
    }

    /// `assignee`を指定しない場合、APIはトークンの所有者のtime entryだけを返すため、
    /// workspaceの全メンバーを指定する。
    async fn fetch_time_entries(&self, filter: &TimeEntryFilter) -> Result<Vec<TimeEntry>> {
        let members = self.fetch_member_ids().await?;
        debug!("Fetching time entries of {} members", members.len());

        let mut query = vec![
            ("start_date", filter.range.start.to_string()),
            ("end_date", filter.range.end.to_string()),
        ];
        if let Some(task_id) = &filter.task_id {
            query.push(("task_id", task_id.clone()));
        }
        if !members.is_empty() {
            query.push(("assignee", members.join(",")));
        }

        let response: TimeEntriesResponse = self
            .get(&format!("/team/{}/time_entries", self.team_id), &query)
            .await?;
        info!("length of time entries: {}", response.data.len());

        Ok(response.data.into_iter().map(TimeEntry::from).collect())
    }

    async fn fetch_current_timer(&self) -> Result<Option<TimeEntry>> {
        let response: TimeEntryResponse = self
            .get(&format!("/team/{}/time_entries/current", self.team_id), &[])
            .await?;

        Ok(response.data.map(TimeEntry::from))
    }

    async fn start_timer(&self, params: &StartTimerParams) -> Result<TimeEntry> {
        let body = StartTimerBody {
            tid: &params.task_id,
            description: params.description.as_deref(),
            billable: params.billable,
            tags: params.tags.iter().map(|name| TagBody { name }).collect(),
        };
        let response: TimeEntryResponse = self
            .send(
                self.request(
                    Method::POST,
                    &format!("/team/{}/time_entries/start", self.team_id),
                )
                .json(&body),
            )
            .await?;

        response
            .data
            .map(TimeEntry::from)
            .ok_or_else(|| TrackerError::upstream("Start timer returned no time entry"))
    }

    async fn stop_timer(&self) -> Result<TimeEntry> {
        let response: TimeEntryResponse = self
            .send(self.request(
                Method::POST,
                &format!("/team/{}/time_entries/stop", self.team_id),
            ))
            .await?;

        response
            .data
            .map(TimeEntry::from)
            .ok_or_else(|| TrackerError::upstream("Stop timer returned no time entry"))
    }

    async fn add_time_entry(&self, params: &CreateTimeEntryParams) -> Result<TimeEntry> {
        let body = CreateTimeEntryBody {
            tid: &params.task_id,
            start: params.start,
            duration: params.duration,
            description: params.description.as_deref(),
            billable: params.billable,
            tags: params.tags.iter().map(|name| TagBody { name }).collect(),
        };
        let response: TimeEntryResponse = self
            .send(
                self.request(Method::POST, &format!("/team/{}/time_entries", self.team_id))
                    .json(&body),
            )
            .await?;

        response
            .data
            .map(TimeEntry::from)
            .ok_or_else(|| TrackerError::upstream("Create time entry returned no time entry"))
    }

    async fn delete_time_entry(&self, entry_id: &str) -> Result<bool> {
        let _: serde_json::Value = self
            .send(self.request(
                Method::DELETE,
                &format!("/team/{}/time_entries/{}", self.team_id, entry_id),
            ))
            .await?;

        Ok(true)
    }
}
