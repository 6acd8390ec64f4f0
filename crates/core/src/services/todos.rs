use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use super::{snapshot, ViewSnapshot};
use crate::api::Backend;
use crate::dispatch::{Dispatcher, Mutation, MutationOutcome, Remote};
use crate::error::{ClientError, ClientResult, ValidationError};
use crate::group::{group_by, Groups};
use crate::input::TaskInput;
use crate::model::{Priority, Task, TaskKind, TaskStatus, ViewCriteria};
use crate::recycle::BinEntry;
use crate::session::Session;
use crate::store::LoadOutcome;
use crate::telemetry;
use crate::validation;

/// The signed-in user's personal to-do list.
pub struct TodoRemote {
    backend: Arc<dyn Backend>,
    user_id: String,
}

#[async_trait]
impl Remote<Task> for TodoRemote {
    fn collection(&self) -> &'static str {
        "todos"
    }

    async fn fetch(&self) -> ClientResult<Vec<Task>> {
        self.backend.list_todos(&self.user_id).await
    }

    async fn create(&self, item: &Task) -> ClientResult<Option<String>> {
        Ok(self.backend.create_todo(&self.user_id, item).await?.id)
    }

    async fn update(&self, item: &Task) -> ClientResult<()> {
        self.backend.update_todo(&self.user_id, item).await?;
        Ok(())
    }

    async fn delete(&self, item: &Task) -> ClientResult<()> {
        self.backend.delete_todo(&self.user_id, &item.id).await?;
        Ok(())
    }

    fn validate(&self, item: &Task) -> Result<(), ValidationError> {
        validation::validate_task(item)
    }
}

#[derive(Clone)]
pub struct TodosService {
    dispatcher: Dispatcher<Task, TodoRemote>,
}

impl TodosService {
    pub fn new(backend: Arc<dyn Backend>, session: Session, telemetry: Arc<telemetry::Handle>) -> Self {
        let remote = TodoRemote {
            backend,
            user_id: session.user_id,
        };
        Self {
            dispatcher: Dispatcher::new(remote, telemetry),
        }
    }

    pub async fn refresh(&self) -> LoadOutcome {
        self.dispatcher.refresh().await
    }

    pub fn list(&self, criteria: &ViewCriteria) -> ViewSnapshot<Task> {
        snapshot(&self.dispatcher, criteria)
    }

    pub fn by_status(&self, criteria: &ViewCriteria) -> Groups<TaskStatus, Task> {
        group_by(&self.dispatcher.view(criteria), |task| task.status)
    }

    pub fn by_priority(&self, criteria: &ViewCriteria) -> Groups<Priority, Task> {
        group_by(&self.dispatcher.view(criteria), |task| task.priority)
    }

    pub fn bin(&self) -> Vec<BinEntry<Task>> {
        self.dispatcher.snapshot().bin
    }

    pub fn get(&self, id: &str) -> Option<Task> {
        self.dispatcher.get(id)
    }

    pub async fn add(&self, input: TaskInput) -> Result<MutationOutcome> {
        let todo = input.into_task(TaskKind::Todo)?;
        Ok(self.dispatcher.submit(Mutation::Create(todo)).await?)
    }

    pub async fn edit(&self, id: &str, input: TaskInput) -> Result<MutationOutcome> {
        let mut todo = self.dispatcher.get(id).ok_or_else(|| ClientError::NotFound {
            collection: "todos",
            id: id.to_string(),
        })?;
        input.apply_to(&mut todo)?;
        Ok(self.dispatcher.submit(Mutation::Update(todo)).await?)
    }

    pub async fn toggle(&self, id: &str) -> Result<MutationOutcome> {
        Ok(self
            .dispatcher
            .submit(Mutation::ToggleStatus(id.to_string()))
            .await?)
    }

    pub async fn delete(&self, id: &str) -> Result<MutationOutcome> {
        Ok(self.dispatcher.submit(Mutation::Delete(id.to_string())).await?)
    }

    pub async fn restore(&self, id: &str) -> Result<MutationOutcome> {
        Ok(self.dispatcher.submit(Mutation::Restore(id.to_string())).await?)
    }

    pub async fn purge(&self, id: &str) -> Result<MutationOutcome> {
        Ok(self
            .dispatcher
            .submit(Mutation::PermanentDelete(id.to_string()))
            .await?)
    }

    pub fn close(&self) {
        self.dispatcher.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MemoryBackend;
    use crate::model::{Choice, Role};
    use crate::store::LoadState;
    use pretty_assertions::assert_eq;

    fn service() -> (Arc<MemoryBackend>, TodosService) {
        let backend = Arc::new(MemoryBackend::new());
        let session = Session::new("12", Role::Employee, None);
        let service = TodosService::new(
            backend.clone(),
            session,
            Arc::new(telemetry::Handle::new()),
        );
        (backend, service)
    }

    fn input(text: &str, priority: Priority) -> TaskInput {
        TaskInput {
            text: text.split_whitespace().map(str::to_string).collect(),
            priority: Some(priority),
            ..TaskInput::default()
        }
    }

    #[tokio::test]
    async fn write_report_create_toggle_filter() {
        let (_backend, service) = service();
        service.refresh().await;

        service
            .add(input("Write report", Priority::High))
            .await
            .unwrap();
        let created = service.list(&ViewCriteria::default()).items;
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].name, "Write report");
        assert_eq!(created[0].status, TaskStatus::Pending);
        assert_eq!(created[0].priority, Priority::High);

        service.toggle(&created[0].id).await.unwrap();
        let completed = service.list(&ViewCriteria::with_status(TaskStatus::Completed));
        assert_eq!(completed.items.len(), 1);
        assert_eq!(completed.items[0].name, "Write report");

        let pending = service.list(&ViewCriteria::with_status(TaskStatus::Pending));
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn delete_bin_purge_counts() {
        let (backend, service) = service();
        for name in ["one", "two", "three"] {
            service.add(input(name, Priority::Low)).await.unwrap();
        }
        let ids: Vec<String> = service
            .list(&ViewCriteria::default())
            .items
            .into_iter()
            .map(|todo| todo.id)
            .collect();

        service.delete(&ids[1]).await.unwrap();
        let view = service.list(&ViewCriteria::default());
        assert_eq!((view.total, view.binned), (2, 1));

        service.purge(&ids[1]).await.unwrap();
        let view = service.list(&ViewCriteria::default());
        assert_eq!((view.total, view.binned), (2, 0));
        assert_eq!(backend.list_todos("12").await.unwrap().len(), 2);

        let err = service.restore(&ids[1]).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ClientError>(),
            Some(ClientError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn server_error_keeps_previous_collection() {
        let (backend, service) = service();
        service.add(input("keep me", Priority::Medium)).await.unwrap();
        backend.fail_next(ClientError::Status {
            status: 500,
            body: None,
        });

        let outcome = service.refresh().await;

        assert!(matches!(outcome, LoadOutcome::Failed(_)));
        let view = service.list(&ViewCriteria::default());
        assert_eq!(view.items.len(), 1);
        assert!(matches!(view.state, LoadState::Error(_)));
        assert!(view.notice.is_some_and(|notice| notice.is_error()));
    }

    #[tokio::test]
    async fn failed_create_is_rolled_back() {
        let (backend, service) = service();
        backend.fail_next(ClientError::Transport("timed out".into()));

        assert!(service.add(input("lost", Priority::Low)).await.is_err());
        assert!(service.list(&ViewCriteria::default()).items.is_empty());
    }

    #[tokio::test]
    async fn edit_overlays_fields() {
        let (_backend, service) = service();
        service.add(input("draft", Priority::Low)).await.unwrap();
        let id = service.list(&ViewCriteria::default()).items[0].id.clone();

        service
            .edit(
                &id,
                TaskInput {
                    text: vec!["final".into()],
                    ..TaskInput::default()
                },
            )
            .await
            .unwrap();

        let criteria = ViewCriteria {
            priority: Choice::Only(Priority::Low),
            ..ViewCriteria::default()
        };
        assert_eq!(service.list(&criteria).items[0].name, "final");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn list_counts_match_items_during_concurrent_deletes() {
        let (_backend, service) = service();
        service.refresh().await;
        let flipped = service.add(input("Flip me", Priority::Low)).await.unwrap();
        service.add(input("Stay put", Priority::Low)).await.unwrap();

        let flipper = service.clone();
        let flips = tokio::spawn(async move {
            for _ in 0..500 {
                flipper.delete(&flipped.id).await.unwrap();
                flipper.restore(&flipped.id).await.unwrap();
            }
        });
        while !flips.is_finished() {
            let view = service.list(&ViewCriteria::default());
            assert_eq!(view.items.len(), view.total);
            assert_eq!(view.total + view.binned, 2);
        }
        flips.await.unwrap();
    }
}
