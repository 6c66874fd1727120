//! In-memory stand-ins for Postgres, S3 and Redis.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, OnceLock},
};

use async_trait::async_trait;
use bytes::Bytes;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    auth::{jwt::JwtKeys, AuthUser},
    comments::{
        repo::CommentRepo,
        repo_types::{Comment, CommentView},
    },
    config::{
        AppConfig, CookieConfig, JwtConfig, RateLimitConfig, StorageConfig, UploadConfig,
    },
    db::{AlreadyExists, StillReferenced},
    projects::{
        repo::ProjectRepo,
        repo_types::{Counter, NewProject, Project, ProjectFilter, ProjectStats},
    },
    rate_limit::MemoryRateLimiter,
    state::AppState,
    storage::StorageClient,
    users::{
        repo::UserRepo,
        repo_types::{NewUser, Role, User},
    },
};

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: "postgres://unused".into(),
        database_max_connections: 1,
        jwt: JwtConfig {
            secret: "test-secret".into(),
            issuer: "test-issuer".into(),
            audience: "test-aud".into(),
            ttl_minutes: 5,
            refresh_ttl_minutes: 60,
        },
        cookies: CookieConfig {
            secure: false,
            domain: None,
        },
        rate_limit: RateLimitConfig {
            redis_url: "redis://unused".into(),
            login_limit: 5,
            login_window_secs: 60,
        },
        storage: StorageConfig {
            endpoint: "fake".into(),
            bucket: "fake".into(),
            access_key: "fake".into(),
            secret_key: "fake".into(),
            region: "us-east-1".into(),
        },
        uploads: UploadConfig {
            max_bytes: 1024,
            presign_ttl_secs: 60,
        },
        host: "127.0.0.1".into(),
        port: 0,
        cors_origin: None,
    }
}

pub struct Fakes {
    pub storage: Arc<FakeStorage>,
}

impl AppState {
    pub fn fake() -> Self {
        Self::fake_with().0
    }

    pub fn fake_with() -> (Self, Fakes) {
        let store = Arc::new(MemoryStore::default());
        let storage = Arc::new(FakeStorage::default());
        let config = test_config();
        let state = AppState {
            jwt: Arc::new(JwtKeys::from(&config.jwt)),
            config: Arc::new(config),
            users: store.clone(),
            projects: store.clone(),
            comments: store,
            storage: storage.clone(),
            limiter: Arc::new(MemoryRateLimiter::default()),
        };
        (state, Fakes { storage })
    }
}

pub struct Seeded {
    pub actor: AuthUser,
    pub user: User,
}

pub const SEED_PASSWORD: &str = "password123";

fn seed_hash() -> String {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| crate::auth::password::hash_password(SEED_PASSWORD).unwrap())
        .clone()
}

/// Inserts a user named after the local part of `email`, password [`SEED_PASSWORD`].
pub async fn seed_user(state: &AppState, email: &str, role: Role) -> Seeded {
    let name = email.split('@').next().unwrap_or(email).to_string();
    let mut user = state
        .users
        .create(NewUser {
            email: email.to_string(),
            name,
            password_hash: seed_hash(),
        })
        .await
        .unwrap();
    if user.role != role {
        user.role = role;
        user = state.users.save(&user).await.unwrap().unwrap();
    }
    Seeded {
        actor: AuthUser { id: user.id, role },
        user,
    }
}

#[derive(Default)]
pub struct FakeStorage {
    objects: Mutex<HashMap<String, (Bytes, String)>>,
    deleted: Mutex<Vec<String>>,
}

impl FakeStorage {
    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn content_type(&self, key: &str) -> Option<String> {
        self.objects.lock().unwrap().get(key).map(|(_, ct)| ct.clone())
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl StorageClient for FakeStorage {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()> {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (body, content_type.to_string()));
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        self.objects.lock().unwrap().remove(key);
        self.deleted.lock().unwrap().push(key.to_string());
        Ok(())
    }

    async fn presign_get(&self, key: &str, seconds: u64) -> anyhow::Result<String> {
        Ok(format!("https://fake.local/{key}?expires={seconds}"))
    }
}

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    projects: Vec<(Project, ProjectStats)>,
    comments: Vec<Comment>,
}

/// One lock over every table so cascades stay consistent.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap()
    }
}

impl Tables {
    fn view(&self, c: &Comment) -> CommentView {
        let author_name = self
            .users
            .iter()
            .find(|u| u.id == c.author_id)
            .map(|u| u.name.clone())
            .unwrap_or_default();
        CommentView {
            id: c.id,
            project_id: c.project_id,
            author_id: c.author_id,
            author_name,
            body: c.body.clone(),
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

fn window<T: Clone>(items: impl Iterator<Item = T>, limit: i64, offset: i64) -> Vec<T> {
    items.skip(offset.max(0) as usize).take(limit.max(0) as usize).collect()
}

#[async_trait]
impl UserRepo for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.lock().users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        Ok(self.lock().users.iter().find(|u| u.email == email).cloned())
    }

    async fn list(&self, limit: i64, offset: i64) -> anyhow::Result<Vec<User>> {
        Ok(window(self.lock().users.iter().rev().cloned(), limit, offset))
    }

    async fn create(&self, user: NewUser) -> anyhow::Result<User> {
        let mut t = self.lock();
        if t.users.iter().any(|u| u.email == user.email) {
            return Err(AlreadyExists("email").into());
        }
        let role = if t.users.is_empty() {
            Role::Admin
        } else {
            Role::User
        };
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            email: user.email,
            name: user.name,
            password_hash: user.password_hash,
            role,
            created_at: now,
            updated_at: now,
        };
        t.users.push(user.clone());
        Ok(user)
    }

    async fn save(&self, user: &User) -> anyhow::Result<Option<User>> {
        let mut t = self.lock();
        if t.users.iter().any(|u| u.email == user.email && u.id != user.id) {
            return Err(AlreadyExists("email").into());
        }
        let Some(slot) = t.users.iter_mut().find(|u| u.id == user.id) else {
            return Ok(None);
        };
        *slot = User {
            updated_at: OffsetDateTime::now_utc(),
            ..user.clone()
        };
        Ok(Some(slot.clone()))
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let mut t = self.lock();
        if t.projects.iter().any(|(p, _)| p.owner_id == id) {
            return Err(StillReferenced("user still owns projects").into());
        }
        let before = t.users.len();
        t.users.retain(|u| u.id != id);
        t.comments.retain(|c| c.author_id != id);
        Ok(t.users.len() != before)
    }
}

#[async_trait]
impl ProjectRepo for MemoryStore {
    async fn list(&self, filter: &ProjectFilter) -> anyhow::Result<Vec<(Project, ProjectStats)>> {
        let t = self.lock();
        let rows = t
            .projects
            .iter()
            .rev()
            .filter(|(p, _)| filter.include_drafts || p.published)
            .filter(|(p, _)| filter.tag.as_ref().map_or(true, |tag| p.tags.contains(tag)))
            .cloned();
        Ok(window(rows, filter.limit, filter.offset))
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<(Project, ProjectStats)>> {
        Ok(self.lock().projects.iter().find(|(p, _)| p.id == id).cloned())
    }

    async fn find_by_slug(&self, slug: &str) -> anyhow::Result<Option<(Project, ProjectStats)>> {
        Ok(self.lock().projects.iter().find(|(p, _)| p.slug == slug).cloned())
    }

    async fn create(&self, new: NewProject) -> anyhow::Result<(Project, ProjectStats)> {
        let mut t = self.lock();
        if t.projects.iter().any(|(p, _)| p.slug == new.slug) {
            return Err(AlreadyExists("slug").into());
        }
        if !t.users.iter().any(|u| u.id == new.owner_id) {
            return Err(StillReferenced("owner does not exist").into());
        }
        let now = OffsetDateTime::now_utc();
        let project = Project {
            id: Uuid::new_v4(),
            owner_id: new.owner_id,
            title: new.title,
            slug: new.slug,
            summary: new.summary,
            body: new.body,
            repo_url: new.repo_url,
            live_url: new.live_url,
            tags: new.tags,
            cover_key: new.cover_key,
            published: new.published,
            created_at: now,
            updated_at: now,
        };
        let stats = ProjectStats {
            project_id: project.id,
            views: 0,
            likes: 0,
            updated_at: now,
        };
        t.projects.push((project.clone(), stats.clone()));
        Ok((project, stats))
    }

    async fn save(&self, project: &Project) -> anyhow::Result<Option<(Project, ProjectStats)>> {
        let mut t = self.lock();
        if t.projects
            .iter()
            .any(|(p, _)| p.slug == project.slug && p.id != project.id)
        {
            return Err(AlreadyExists("slug").into());
        }
        let Some(slot) = t.projects.iter_mut().find(|(p, _)| p.id == project.id) else {
            return Ok(None);
        };
        slot.0 = Project {
            updated_at: OffsetDateTime::now_utc(),
            ..project.clone()
        };
        Ok(Some(slot.clone()))
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<Option<Project>> {
        let mut t = self.lock();
        let Some(pos) = t.projects.iter().position(|(p, _)| p.id == id) else {
            return Ok(None);
        };
        let (project, _) = t.projects.remove(pos);
        t.comments.retain(|c| c.project_id != id);
        Ok(Some(project))
    }

    async fn bump(&self, id: Uuid, counter: Counter) -> anyhow::Result<Option<ProjectStats>> {
        let mut t = self.lock();
        let Some((_, stats)) = t.projects.iter_mut().find(|(p, _)| p.id == id) else {
            return Ok(None);
        };
        match counter {
            Counter::Views => stats.views += 1,
            Counter::Likes => stats.likes += 1,
        }
        stats.updated_at = OffsetDateTime::now_utc();
        Ok(Some(stats.clone()))
    }

    async fn cover_in_use(&self, key: &str, except: Uuid) -> anyhow::Result<bool> {
        Ok(self
            .lock()
            .projects
            .iter()
            .any(|(p, _)| p.id != except && p.cover_key.as_deref() == Some(key)))
    }
}

#[async_trait]
impl CommentRepo for MemoryStore {
    async fn list_for_project(
        &self,
        project_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<CommentView>> {
        let t = self.lock();
        let views = t
            .comments
            .iter()
            .filter(|c| c.project_id == project_id)
            .map(|c| t.view(c));
        Ok(window(views, limit, offset))
    }

    async fn find(&self, id: Uuid) -> anyhow::Result<Option<Comment>> {
        Ok(self.lock().comments.iter().find(|c| c.id == id).cloned())
    }

    async fn create(&self, project_id: Uuid, author_id: Uuid, body: &str) -> anyhow::Result<CommentView> {
        let mut t = self.lock();
        let known_project = t.projects.iter().any(|(p, _)| p.id == project_id);
        let known_author = t.users.iter().any(|u| u.id == author_id);
        if !known_project || !known_author {
            return Err(StillReferenced("project or author no longer exists").into());
        }
        let now = OffsetDateTime::now_utc();
        let comment = Comment {
            id: Uuid::new_v4(),
            project_id,
            author_id,
            body: body.to_string(),
            created_at: now,
            updated_at: now,
        };
        t.comments.push(comment.clone());
        Ok(t.view(&comment))
    }

    async fn update_body(&self, id: Uuid, body: &str) -> anyhow::Result<Option<CommentView>> {
        let mut t = self.lock();
        let Some(c) = t.comments.iter_mut().find(|c| c.id == id) else {
            return Ok(None);
        };
        c.body = body.to_string();
        c.updated_at = OffsetDateTime::now_utc();
        let c = c.clone();
        Ok(Some(t.view(&c)))
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let mut t = self.lock();
        let before = t.comments.len();
        t.comments.retain(|c| c.id != id);
        Ok(t.comments.len() != before)
    }
}
