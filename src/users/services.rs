use tracing::info;
use uuid::Uuid;

use super::{dto::UpdateUserRequest, repo_types::User};
use crate::{
    auth::{
        password::hash_password_async,
        services::{validate_password, validated_email, validated_name},
        AuthUser,
    },
    error::{AppError, AppResult},
    pagination::Pagination,
    state::AppState,
};

pub async fn list_users(state: &AppState, page: Pagination) -> AppResult<Vec<User>> {
    let page = page.clamped();
    Ok(state.users.list(page.limit, page.offset).await?)
}

/// Admin claim of `actor`, confirmed against the stored record.
pub(crate) async fn confirmed_admin(state: &AppState, actor: AuthUser) -> AppResult<bool> {
    if !actor.is_admin() {
        return Ok(false);
    }
    Ok(state
        .users
        .find_by_id(actor.id)
        .await?
        .is_some_and(|u| u.is_admin()))
}

async fn authorize(state: &AppState, actor: AuthUser, id: Uuid) -> AppResult<()> {
    if actor.id == id || confirmed_admin(state, actor).await? {
        Ok(())
    } else {
        Err(AppError::forbidden())
    }
}

pub async fn get_user(state: &AppState, actor: AuthUser, id: Uuid) -> AppResult<User> {
    authorize(state, actor, id).await?;
    state
        .users
        .find_by_id(id)
        .await?
        .ok_or(AppError::NotFound("user"))
}

pub async fn update_user(
    state: &AppState,
    actor: AuthUser,
    id: Uuid,
    req: UpdateUserRequest,
) -> AppResult<User> {
    let mut user = get_user(state, actor, id).await?;

    if let Some(role) = req.role {
        if !confirmed_admin(state, actor).await? {
            return Err(AppError::Forbidden("only admins may change roles".into()));
        }
        if actor.id == id && role != user.role {
            return Err(AppError::bad_request("admins cannot change their own role"));
        }
        user.role = role;
    }
    if let Some(name) = req.name.as_deref() {
        user.name = validated_name(name)?;
    }
    if let Some(email) = req.email.as_deref() {
        user.email = validated_email(email)?;
    }
    if let Some(password) = req.password {
        validate_password(&password)?;
        user.password_hash = hash_password_async(password).await?;
    }

    let saved = state
        .users
        .save(&user)
        .await?
        .ok_or(AppError::NotFound("user"))?;
    info!(user_id = %saved.id, actor = %actor.id, "user updated");
    Ok(saved)
}

pub async fn delete_user(state: &AppState, actor: AuthUser, id: Uuid) -> AppResult<()> {
    authorize(state, actor, id).await?;
    if actor.is_admin() && actor.id == id {
        return Err(AppError::bad_request("admins cannot delete themselves"));
    }
    if !state.users.delete(id).await? {
        return Err(AppError::NotFound("user"));
    }
    info!(user_id = %id, actor = %actor.id, "user deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::password::verify_password,
        projects::{dto::CreateProjectRequest, services::create_project},
        testing::{seed_user, Seeded},
        users::repo_types::Role,
    };

    #[tokio::test]
    async fn users_can_only_see_themselves() {
        let state = AppState::fake();
        let Seeded { actor: alice, .. } = seed_user(&state, "alice@example.com", Role::User).await;
        let Seeded { actor: bob, .. } = seed_user(&state, "bob@example.com", Role::User).await;

        assert!(get_user(&state, alice, alice.id).await.is_ok());
        let err = get_user(&state, alice, bob.id).await.err().unwrap();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn admin_reads_anyone_and_missing_is_404() {
        let state = AppState::fake();
        let Seeded { actor: admin, .. } = seed_user(&state, "root@example.com", Role::Admin).await;
        let Seeded { actor: bob, .. } = seed_user(&state, "bob@example.com", Role::User).await;

        assert_eq!(get_user(&state, admin, bob.id).await.unwrap().id, bob.id);
        let err = get_user(&state, admin, Uuid::new_v4()).await.err().unwrap();
        assert!(matches!(err, AppError::NotFound("user")));
    }

    #[tokio::test]
    async fn role_changes_are_admin_only() {
        let state = AppState::fake();
        let Seeded { actor: admin, .. } = seed_user(&state, "root@example.com", Role::Admin).await;
        let Seeded { actor: bob, .. } = seed_user(&state, "bob@example.com", Role::User).await;

        let req = UpdateUserRequest {
            role: Some(Role::Admin),
            ..Default::default()
        };
        let err = update_user(&state, bob, bob.id, req).await.err().unwrap();
        assert!(matches!(err, AppError::Forbidden(_)));

        let req = UpdateUserRequest {
            role: Some(Role::Admin),
            ..Default::default()
        };
        let promoted = update_user(&state, admin, bob.id, req).await.unwrap();
        assert_eq!(promoted.role, Role::Admin);

        let req = UpdateUserRequest {
            role: Some(Role::User),
            ..Default::default()
        };
        let err = update_user(&state, admin, admin.id, req).await.err().unwrap();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn self_update_rehashes_password_and_checks_email() {
        let state = AppState::fake();
        let Seeded { actor: alice, .. } = seed_user(&state, "alice@example.com", Role::User).await;
        seed_user(&state, "taken@example.com", Role::User).await;

        let req = UpdateUserRequest {
            name: Some(" Alice B. ".into()),
            password: Some("a-brand-new-pass".into()),
            ..Default::default()
        };
        let updated = update_user(&state, alice, alice.id, req).await.unwrap();
        assert_eq!(updated.name, "Alice B.");
        assert!(verify_password("a-brand-new-pass", &updated.password_hash).unwrap());

        let req = UpdateUserRequest {
            email: Some("Taken@Example.com".into()),
            ..Default::default()
        };
        let err = update_user(&state, alice, alice.id, req).await.err().unwrap();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn delete_rules() {
        let state = AppState::fake();
        let Seeded { actor: admin, .. } = seed_user(&state, "root@example.com", Role::Admin).await;
        let Seeded { actor: bob, .. } = seed_user(&state, "bob@example.com", Role::User).await;
        let Seeded { actor: carol, .. } = seed_user(&state, "carol@example.com", Role::User).await;

        let err = delete_user(&state, bob, carol.id).await.err().unwrap();
        assert!(matches!(err, AppError::Forbidden(_)));
        let err = delete_user(&state, admin, admin.id).await.err().unwrap();
        assert!(matches!(err, AppError::BadRequest(_)));

        delete_user(&state, bob, bob.id).await.unwrap();
        delete_user(&state, admin, carol.id).await.unwrap();
        let err = delete_user(&state, admin, carol.id).await.err().unwrap();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn stale_admin_claims_are_not_honoured() {
        let state = AppState::fake();
        let Seeded { actor: root, .. } = seed_user(&state, "root@example.com", Role::Admin).await;
        let Seeded { actor: deputy, .. } = seed_user(&state, "deputy@example.com", Role::Admin).await;
        let Seeded { actor: bob, .. } = seed_user(&state, "bob@example.com", Role::User).await;

        let demote = UpdateUserRequest {
            role: Some(Role::User),
            ..Default::default()
        };
        update_user(&state, root, deputy.id, demote).await.unwrap();

        // `deputy` still carries the admin claim it was issued with.
        assert!(deputy.is_admin());
        let err = get_user(&state, deputy, bob.id).await.err().unwrap();
        assert!(matches!(err, AppError::Forbidden(_)));
        let promote = UpdateUserRequest {
            role: Some(Role::Admin),
            ..Default::default()
        };
        let err = update_user(&state, deputy, bob.id, promote).await.err().unwrap();
        assert!(matches!(err, AppError::Forbidden(_)));
        let err = delete_user(&state, deputy, bob.id).await.err().unwrap();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn owners_of_projects_cannot_be_deleted() {
        let state = AppState::fake();
        let Seeded { actor: root, .. } = seed_user(&state, "root@example.com", Role::Admin).await;
        let Seeded { actor: other, .. } = seed_user(&state, "other@example.com", Role::Admin).await;
        let req = CreateProjectRequest {
            title: "Kept".into(),
            ..Default::default()
        };
        create_project(&state, root, req).await.unwrap();

        let err = delete_user(&state, other, root.id).await.err().unwrap();
        assert!(matches!(err, AppError::Conflict(_)));
        assert!(get_user(&state, other, root.id).await.is_ok());
    }

    #[tokio::test]
    async fn list_is_newest_first_and_clamped() {
        let state = AppState::fake();
        for i in 0..3 {
            seed_user(&state, &format!("u{i}@example.com"), Role::User).await;
        }
        let all = list_users(&state, Pagination::default()).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].email, "u2@example.com");

        let page = list_users(&state, Pagination { limit: 0, offset: -1 }).await.unwrap();
        assert_eq!(page.len(), 1);
    }
}
