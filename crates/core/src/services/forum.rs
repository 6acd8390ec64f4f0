use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;

use super::ViewSnapshot;
use crate::api::{Backend, TopicQuery};
use crate::dispatch::{Dispatcher, Mutation, MutationOutcome, Remote};
use crate::error::{ClientError, ClientResult, ValidationError};
use crate::model::{Entity, Post, Role, SortDirection, Topic, TopicCriteria};
use crate::session::Session;
use crate::store::LoadOutcome;
use crate::telemetry;
use crate::validation;
use crate::view::{compare_dates, derive_topics};

pub struct TopicRemote {
    backend: Arc<dyn Backend>,
    /// Server-side filter sent with every fetch, including post-mutation re-fetches.
    query: Mutex<TopicQuery>,
}

#[async_trait]
impl Remote<Topic> for TopicRemote {
    fn collection(&self) -> &'static str {
        "topics"
    }

    async fn fetch(&self) -> ClientResult<Vec<Topic>> {
        let query = self.query.lock().clone();
        self.backend.list_topics(&query).await
    }

    async fn create(&self, item: &Topic) -> ClientResult<Option<String>> {
        Ok(self.backend.create_topic(item).await?.id)
    }

    async fn update(&self, _item: &Topic) -> ClientResult<()> {
        Err(ClientError::Unsupported {
            collection: "topics",
            action: "update",
        })
    }

    async fn delete(&self, item: &Topic) -> ClientResult<()> {
        self.backend.delete_topic(&item.id).await?;
        Ok(())
    }

    fn validate(&self, item: &Topic) -> Result<(), ValidationError> {
        validation::validate_topic(item)
    }
}

pub struct PostRemote {
    backend: Arc<dyn Backend>,
    topic_id: String,
}

#[async_trait]
impl Remote<Post> for PostRemote {
    fn collection(&self) -> &'static str {
        "posts"
    }

    async fn fetch(&self) -> ClientResult<Vec<Post>> {
        self.backend.list_posts(&self.topic_id).await
    }

    async fn create(&self, item: &Post) -> ClientResult<Option<String>> {
        Ok(self.backend.create_post(item).await?.id)
    }

    async fn update(&self, item: &Post) -> ClientResult<()> {
        self.backend.update_post(item).await?;
        Ok(())
    }

    async fn delete(&self, item: &Post) -> ClientResult<()> {
        self.backend.delete_post(&item.id).await?;
        Ok(())
    }

    fn validate(&self, item: &Post) -> Result<(), ValidationError> {
        validation::validate_post(item)
    }
}

/// Forum entries are removed for good: bin then purge, restoring the entry if the purge fails.
async fn remove<T, R>(dispatcher: &Dispatcher<T, R>, id: &str) -> Result<MutationOutcome>
where
    T: Entity,
    R: Remote<T>,
{
    dispatcher.submit(Mutation::Delete(id.to_string())).await?;
    match dispatcher
        .submit(Mutation::PermanentDelete(id.to_string()))
        .await
    {
        Ok(outcome) => Ok(outcome),
        Err(err) => {
            dispatcher.submit(Mutation::Restore(id.to_string())).await?;
            Err(err.into())
        }
    }
}

#[derive(Clone)]
pub struct ForumService {
    backend: Arc<dyn Backend>,
    session: Session,
    telemetry: Arc<telemetry::Handle>,
    topics: Dispatcher<Topic, TopicRemote>,
    threads: Arc<Mutex<HashMap<String, ThreadService>>>,
}

impl ForumService {
    pub fn new(backend: Arc<dyn Backend>, session: Session, telemetry: Arc<telemetry::Handle>) -> Self {
        let remote = TopicRemote {
            backend: Arc::clone(&backend),
            query: Mutex::new(TopicQuery::default()),
        };
        Self {
            topics: Dispatcher::new(remote, Arc::clone(&telemetry)),
            backend,
            session,
            telemetry,
            threads: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Load every topic.
    pub async fn refresh(&self) -> LoadOutcome {
        *self.topics.remote().query.lock() = TopicQuery::default();
        self.topics.refresh().await
    }

    /// Load only the topics the server matches for `criteria`; later
    /// re-fetches keep the same filter until the next `refresh`.
    pub async fn search(&self, criteria: &TopicCriteria) -> LoadOutcome {
        *self.topics.remote().query.lock() = TopicQuery::from(criteria);
        self.topics.refresh().await
    }

    pub fn topics(&self, criteria: &TopicCriteria) -> ViewSnapshot<Topic> {
        self.topics.with_workspace(|workspace| {
            ViewSnapshot::of(workspace, derive_topics(workspace.active.items(), criteria))
        })
    }

    pub async fn create_topic(
        &self,
        title: &str,
        description: &str,
        technical: bool,
    ) -> Result<MutationOutcome> {
        let topic = Topic {
            id: String::new(),
            title: title.trim().to_string(),
            description: description.trim().to_string(),
            technical,
            created_by: self.session.user_id.clone(),
            created_at: None,
        };
        Ok(self.topics.submit(Mutation::Create(topic)).await?)
    }

    /// Authors and managers may remove a topic.
    pub async fn delete_topic(&self, id: &str) -> Result<MutationOutcome> {
        let topic = self.topics.get(id).ok_or_else(|| ClientError::NotFound {
            collection: "topics",
            id: id.to_string(),
        })?;
        self.session.ensure(
            topic.created_by == self.session.user_id || self.session.role == Role::Manager,
            "delete this topic",
        )?;
        let outcome = remove(&self.topics, id).await?;
        if let Some(thread) = self.threads.lock().remove(id) {
            thread.close();
        }
        Ok(outcome)
    }

    pub fn thread(&self, topic_id: &str) -> Result<ThreadService> {
        if self.topics.get(topic_id).is_none() {
            return Err(ClientError::NotFound {
                collection: "topics",
                id: topic_id.to_string(),
            }
            .into());
        }
        let mut threads = self.threads.lock();
        let thread = threads
            .entry(topic_id.to_string())
            .or_insert_with(|| {
                ThreadService::new(
                    Arc::clone(&self.backend),
                    self.session.clone(),
                    topic_id,
                    Arc::clone(&self.telemetry),
                )
            })
            .clone();
        Ok(thread)
    }

    pub fn close(&self) {
        self.topics.close();
        for thread in self.threads.lock().values() {
            thread.close();
        }
    }
}

/// Posts under one topic, oldest first.
#[derive(Clone)]
pub struct ThreadService {
    session: Session,
    topic_id: String,
    posts: Dispatcher<Post, PostRemote>,
}

impl ThreadService {
    fn new(
        backend: Arc<dyn Backend>,
        session: Session,
        topic_id: &str,
        telemetry: Arc<telemetry::Handle>,
    ) -> Self {
        let remote = PostRemote {
            backend,
            topic_id: topic_id.to_string(),
        };
        Self {
            session,
            topic_id: topic_id.to_string(),
            posts: Dispatcher::new(remote, telemetry),
        }
    }

    pub fn topic_id(&self) -> &str {
        &self.topic_id
    }

    pub async fn refresh(&self) -> LoadOutcome {
        self.posts.refresh().await
    }

    pub fn posts(&self) -> Vec<Post> {
        let mut posts = self.posts.items();
        posts.sort_by(|a, b| compare_dates(a.created_at, b.created_at, SortDirection::Asc));
        posts
    }

    pub async fn reply(&self, content: &str) -> Result<MutationOutcome> {
        let post = Post {
            id: String::new(),
            topic_id: self.topic_id.clone(),
            content: content.trim().to_string(),
            user_id: self.session.user_id.clone(),
            created_at: None,
        };
        Ok(self.posts.submit(Mutation::Create(post)).await?)
    }

    pub async fn edit(&self, id: &str, content: &str) -> Result<MutationOutcome> {
        let mut post = self.find(id)?;
        self.session
            .ensure(post.user_id == self.session.user_id, "edit this post")?;
        post.content = content.trim().to_string();
        Ok(self.posts.submit(Mutation::Update(post)).await?)
    }

    pub async fn delete(&self, id: &str) -> Result<MutationOutcome> {
        let post = self.find(id)?;
        self.session.ensure(
            post.user_id == self.session.user_id || self.session.role == Role::Manager,
            "delete this post",
        )?;
        remove(&self.posts, id).await
    }

    pub fn close(&self) {
        self.posts.close();
    }

    fn find(&self, id: &str) -> Result<Post, ClientError> {
        self.posts.get(id).ok_or_else(|| ClientError::NotFound {
            collection: "posts",
            id: id.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MemoryBackend;
    use crate::model::Choice;
    use pretty_assertions::assert_eq;

    async fn signed_in(user: &str, role: Role) -> (Arc<MemoryBackend>, ForumService) {
        let backend = Arc::new(MemoryBackend::with_sample_data());
        let forum = ForumService::new(
            backend.clone(),
            Session::new(user, role, None),
            Arc::new(telemetry::Handle::new()),
        );
        forum.refresh().await;
        (backend, forum)
    }

    fn titles(view: &ViewSnapshot<Topic>) -> Vec<&str> {
        view.items.iter().map(|topic| topic.title.as_str()).collect()
    }

    #[tokio::test]
    async fn topics_filter_and_sort_newest_first() {
        let (_backend, forum) = signed_in("3", Role::Employee).await;

        let all = forum.topics(&TopicCriteria::default());
        assert_eq!(titles(&all), vec!["Friday lunch", "Staging deploys"]);

        let technical = forum.topics(&TopicCriteria {
            technical: Choice::Only(true),
            ..TopicCriteria::default()
        });
        assert_eq!(titles(&technical), vec!["Staging deploys"]);
    }

    #[tokio::test]
    async fn search_narrows_the_fetch() {
        let (_backend, forum) = signed_in("3", Role::Employee).await;
        let criteria = TopicCriteria {
            search: Some(" LUNCH ".into()),
            ..TopicCriteria::default()
        };

        forum.search(&criteria).await;
        let view = forum.topics(&criteria);
        assert_eq!(titles(&view), vec!["Friday lunch"]);
        assert_eq!(view.total, 1);

        forum.refresh().await;
        assert_eq!(forum.topics(&TopicCriteria::default()).total, 2);
    }

    #[test]
    fn criteria_become_query_parameters() {
        let query = TopicQuery::from(&TopicCriteria {
            technical: Choice::Only(false),
            search: Some("   ".into()),
            newest_first: false,
        });
        assert_eq!(
            query,
            TopicQuery {
                technical: Some(false),
                search: None,
            }
        );
    }

    #[tokio::test]
    async fn empty_topic_is_rejected() {
        let (backend, forum) = signed_in("3", Role::Employee).await;
        let before = backend.request_count();

        assert!(forum.create_topic("  ", "body", false).await.is_err());
        assert_eq!(backend.request_count(), before);
    }

    #[tokio::test]
    async fn only_author_or_manager_deletes_topic() {
        let (_backend, forum) = signed_in("4", Role::Employee).await;
        let staging = forum.topics(&TopicCriteria::default()).items[1].clone();

        let err = forum.delete_topic(&staging.id).await.unwrap_err();
        assert!(err.downcast_ref::<ValidationError>().is_some());

        let (_backend, manager) = signed_in("1", Role::Manager).await;
        manager.delete_topic(&staging.id).await.unwrap();
        let view = manager.topics(&TopicCriteria::default());
        assert_eq!(view.items.len(), 1);
        assert_eq!(view.binned, 0);
    }

    #[tokio::test]
    async fn replies_append_to_thread() {
        let (_backend, forum) = signed_in("4", Role::Employee).await;
        let staging = forum.topics(&TopicCriteria::default()).items[1].id.clone();
        let thread = forum.thread(&staging).unwrap();
        thread.refresh().await;

        thread.reply("Thanks, booked for Thursday").await.unwrap();

        let posts = thread.posts();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[1].content, "Thanks, booked for Thursday");
        assert_eq!(posts[1].user_id, "4");
    }

    #[tokio::test]
    async fn failed_purge_restores_post() {
        let (backend, forum) = signed_in("2", Role::TeamLeader).await;
        let staging = forum.topics(&TopicCriteria::default()).items[1].id.clone();
        let thread = forum.thread(&staging).unwrap();
        thread.refresh().await;
        let post = thread.posts()[0].id.clone();

        backend.fail_next(ClientError::Status {
            status: 500,
            body: None,
        });
        assert!(thread.delete(&post).await.is_err());
        assert_eq!(thread.posts().len(), 1);
    }
}
