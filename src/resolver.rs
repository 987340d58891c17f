use log::{debug, info, warn};

use crate::error::{Result, TrackerError};
use crate::hierarchy::{Hierarchy, HierarchyNode, NodeKind};
use crate::repository::WorkspaceRepository;

/// taskやlistの名前をidに解決する。
///
/// 名前の比較は大文字小文字を区別しない完全一致。同名の候補が複数ある場合は
/// 階層の探索順で最初のものを採用する。
pub struct NameResolver<'a, T: WorkspaceRepository> {
    repository: &'a T,
}

impl<'a, T: WorkspaceRepository> NameResolver<'a, T> {
    /// 新しい`NameResolver`を返す。
    ///
    /// # Arguments
    /// * `repository` - ClickUp APIと通信するためのリポジトリ
    pub fn new(repository: &'a T) -> Self {
        Self { repository }
    }

    /// list名をidに解決する。
    pub async fn resolve_list_id(&self, list_name: &str) -> Result<String> {
        let tree = self.repository.fetch_workspace_hierarchy().await?;

        Ok(find_list(&tree, list_name)?.id.clone())
    }

    /// task名をidに解決する。
    ///
    /// `list_name`を指定した場合はそのlistのtaskだけを探す。指定しない場合は
    /// workspace内のすべてのlistを探索順に取得していくため、list数だけAPIを呼ぶことがある。
    ///
    /// # Arguments
    ///
    /// * `task_name` - task名
    /// * `list_name` - 探索対象を絞り込むlist名
    pub async fn resolve_task_id(&self, task_name: &str, list_name: Option<&str>) -> Result<String> {
        let tree = self.repository.fetch_workspace_hierarchy().await?;

        let list_ids: Vec<String> = match list_name {
            Some(list_name) => vec![find_list(&tree, list_name)?.id.clone()],
            None => tree
                .nodes_of_kind(NodeKind::List)
                .map(|node| node.id.clone())
                .collect(),
        };

        let needle = task_name.to_lowercase();
        for list_id in &list_ids {
            let tasks = self.repository.fetch_tasks_in_list(list_id).await?;
            debug!("Searching {} tasks in list {}", tasks.len(), list_id);

            if let Some(task) = tasks.into_iter().find(|t| t.name.to_lowercase() == needle) {
                info!("Resolved task '{}' to {} in list {}", task_name, task.id, list_id);
                return Ok(task.id);
            }
        }

        Err(TrackerError::NotFound {
            kind: NodeKind::Task.as_str(),
            name: task_name.to_string(),
        })
    }
}

fn find_list<'t>(tree: &'t Hierarchy, list_name: &str) -> Result<&'t HierarchyNode> {
    let list = tree
        .find_by_name(list_name, NodeKind::List)
        .ok_or_else(|| TrackerError::NotFound {
            kind: NodeKind::List.as_str(),
            name: list_name.to_string(),
        })?;

    let ids: Vec<&str> = tree
        .find_all_by_name(list_name, NodeKind::List)
        .map(|node| node.id.as_str())
        .collect();
    if ids.len() > 1 {
        warn!(
            "List name '{}' matches {} lists {:?}, using {}",
            list_name,
            ids.len(),
            ids,
            list.id
        );
    }

    Ok(list)
}
