use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::{
    authentication::{hash_password_argon2, verify_password_argon2, TokenKeys},
    db_helpers::{
        delete_follow, get_user_by_email, get_user_by_id, get_user_by_username, insert_follow,
        insert_user, is_following, update_user, UserChanges,
    },
    errors::RequestError,
    models::{Profile, User},
    utils::is_unique_violation,
    Database,
};

use super::{optional_field, required_field};

const BAD_CREDENTIALS: &str = "Invalid email or password";

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub password: String,
}

/// A user together with a freshly issued token.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user: User,
    pub token: String,
}

/// Registration, login, profile edits and the follow graph.
#[derive(Clone)]
pub struct IdentityService {
    db: Database,
    keys: Arc<TokenKeys>,
}

impl IdentityService {
    pub fn new(db: Database, keys: Arc<TokenKeys>) -> Self {
        Self { db, keys }
    }

    pub async fn register(&self, new_user: NewUser) -> Result<AuthenticatedUser, RequestError> {
        let email = required_field(&new_user.email, "email")?;
        let username = required_field(&new_user.username, "username")?;
        if new_user.password.is_empty() {
            return Err(RequestError::Validation("password can't be blank".into()));
        }
        let password = hash_password_argon2(new_user.password).await?;

        let mut conn = self.db.writer.acquire().await?;
        let user = insert_user(&mut conn, &email, &username, &password, Utc::now())
            .await
            .map_err(taken_or_database)?;
        info!(user_id = user.id, username = %user.username, "registered user");
        self.authenticated(user)
    }

    pub async fn login(&self, email: &str, password: String) -> Result<AuthenticatedUser, RequestError> {
        let mut conn = self.db.reader.acquire().await?;
        let user = get_user_by_email(&mut conn, email.trim()).await?;
        drop(conn);

        let user = match user {
            Some(user) => user,
            None => {
                debug!("login for unknown email");
                return Err(RequestError::NotAuthorized(BAD_CREDENTIALS));
            }
        };
        if !verify_password_argon2(password, &user.password).await? {
            debug!(user_id = user.id, "login with wrong password");
            return Err(RequestError::NotAuthorized(BAD_CREDENTIALS));
        }
        self.authenticated(user)
    }

    /// The caller's record with a newly issued token.
    pub async fn current_user(&self, user_id: i64) -> Result<AuthenticatedUser, RequestError> {
        let mut conn = self.db.reader.acquire().await?;
        let user = get_user_by_id(&mut conn, user_id)
            .await?
            .ok_or(RequestError::NotFound("User not found"))?;
        self.authenticated(user)
    }

    /// Applies whichever fields are present; the rest stay as they were.
    pub async fn update_user(&self, user_id: i64, changes: UserChanges) -> Result<User, RequestError> {
        let password = match changes.password {
            Some(password) if password.is_empty() => {
                return Err(RequestError::Validation("password can't be blank".into()))
            }
            Some(password) => Some(hash_password_argon2(password).await?),
            None => None,
        };
        let changes = UserChanges {
            email: optional_field(changes.email, "email")?,
            username: optional_field(changes.username, "username")?,
            password,
            bio: changes.bio,
            image: changes.image,
        };

        let mut conn = self.db.writer.acquire().await?;
        update_user(&mut conn, user_id, changes, Utc::now())
            .await
            .map_err(taken_or_database)?
            .ok_or(RequestError::NotFound("User not found"))
    }

    pub async fn get_profile(&self, viewer: Option<i64>, username: &str) -> Result<Profile, RequestError> {
        let mut conn = self.db.reader.acquire().await?;
        let user = find_by_username(&mut conn, username).await?;
        let following = is_following(&mut conn, viewer, user.id).await?;
        Ok(Profile::new(user, following))
    }

    pub async fn follow(&self, follower_id: i64, username: &str) -> Result<Profile, RequestError> {
        let mut conn = self.db.writer.acquire().await?;
        let followee = find_by_username(&mut conn, username).await?;
        if followee.id == follower_id {
            return Err(RequestError::Validation("you can't follow yourself".into()));
        }
        insert_follow(&mut conn, follower_id, followee.id, Utc::now()).await?;
        let following = is_following(&mut conn, Some(follower_id), followee.id).await?;
        Ok(Profile::new(followee, following))
    }

    pub async fn unfollow(&self, follower_id: i64, username: &str) -> Result<Profile, RequestError> {
        let mut conn = self.db.writer.acquire().await?;
        let followee = find_by_username(&mut conn, username).await?;
        delete_follow(&mut conn, follower_id, followee.id).await?;
        let following = is_following(&mut conn, Some(follower_id), followee.id).await?;
        Ok(Profile::new(followee, following))
    }

    fn authenticated(&self, user: User) -> Result<AuthenticatedUser, RequestError> {
        let token = self.keys.issue(user.id)?;
        Ok(AuthenticatedUser { user, token })
    }
}

async fn find_by_username(
    conn: &mut sqlx::SqliteConnection,
    username: &str,
) -> Result<User, RequestError> {
    get_user_by_username(conn, username)
        .await?
        .ok_or(RequestError::NotFound("User not found"))
}

fn taken_or_database(error: sqlx::Error) -> RequestError {
    if is_unique_violation(&error, "users.email") {
        RequestError::Validation("email has already been taken".into())
    } else if is_unique_violation(&error, "users.username") {
        RequestError::Validation("username has already been taken".into())
    } else {
        RequestError::Database(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{app, file_app, register, TempDatabase};

    #[tokio::test]
    async fn duplicate_registrations_are_rejected() {
        let app = app().await;
        let jake = register(&app, "jake").await;

        let same_email = NewUser {
            email: "jake@example.com".into(),
            username: "someone".into(),
            password: "password".into(),
        };
        let error = app.identity.register(same_email).await.unwrap_err();
        assert!(matches!(error, RequestError::Validation(ref m) if m.contains("email")));

        let same_username = NewUser {
            email: "someone@example.com".into(),
            username: "jake".into(),
            password: "password".into(),
        };
        let error = app.identity.register(same_username).await.unwrap_err();
        assert!(matches!(error, RequestError::Validation(ref m) if m.contains("username")));

        let still_there = app.identity.current_user(jake.user.id).await.unwrap();
        assert_eq!(still_there.user.email, "jake@example.com");
        assert_eq!(app.keys.verify(&still_there.token).unwrap(), jake.user.id);
    }

    #[tokio::test]
    async fn passwords_are_stored_hashed() {
        let app = app().await;
        let jake = register(&app, "jake").await;
        assert_ne!(jake.user.password, "password");
        assert_eq!(app.keys.verify(&jake.token).unwrap(), jake.user.id);
    }

    #[tokio::test]
    async fn login_failures_look_the_same() {
        let app = app().await;
        register(&app, "jake").await;

        let unknown = app
            .identity
            .login("nobody@example.com", "password".into())
            .await
            .unwrap_err();
        let wrong = app
            .identity
            .login("jake@example.com", "wrong".into())
            .await
            .unwrap_err();
        assert_eq!(unknown.to_string(), wrong.to_string());
        assert!(matches!(wrong, RequestError::NotAuthorized(_)));

        let ok = app
            .identity
            .login("jake@example.com", "password".into())
            .await
            .unwrap();
        assert_eq!(ok.user.username, "jake");
    }

    #[tokio::test]
    async fn emails_are_trimmed_on_register_and_login() {
        let app = app().await;
        let padded = NewUser {
            email: " jake@example.com ".into(),
            username: "jake".into(),
            password: "password".into(),
        };
        let registered = app.identity.register(padded).await.unwrap();
        assert_eq!(registered.user.email, "jake@example.com");

        let ok = app
            .identity
            .login(" jake@example.com ", "password".into())
            .await
            .unwrap();
        assert_eq!(ok.user.id, registered.user.id);
    }

    #[tokio::test]
    async fn updates_are_partial_and_rehash_passwords() {
        let app = app().await;
        let jake = register(&app, "jake").await;

        let changes = UserChanges {
            bio: Some("I like to skateboard".into()),
            password: Some("new-password".into()),
            ..Default::default()
        };
        let updated = app.identity.update_user(jake.user.id, changes).await.unwrap();
        assert_eq!(updated.bio.as_deref(), Some("I like to skateboard"));
        assert_eq!(updated.email, "jake@example.com");
        assert_ne!(updated.password, jake.user.password);

        app.identity
            .login("jake@example.com", "new-password".into())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn renaming_onto_a_taken_username_fails() {
        let app = app().await;
        let jake = register(&app, "jake").await;
        register(&app, "anne").await;

        let changes = UserChanges {
            username: Some("anne".into()),
            ..Default::default()
        };
        let error = app.identity.update_user(jake.user.id, changes).await.unwrap_err();
        assert!(matches!(error, RequestError::Validation(_)));
    }

    #[tokio::test]
    async fn following_is_idempotent_and_viewer_relative() {
        let app = app().await;
        let jake = register(&app, "jake").await;
        let anne = register(&app, "anne").await;

        assert!(app.identity.follow(anne.user.id, "jake").await.unwrap().following);
        assert!(app.identity.follow(anne.user.id, "jake").await.unwrap().following);

        let seen_by_anne = app.identity.get_profile(Some(anne.user.id), "jake").await.unwrap();
        let seen_by_jake = app.identity.get_profile(Some(jake.user.id), "anne").await.unwrap();
        let anonymous = app.identity.get_profile(None, "jake").await.unwrap();
        assert!(seen_by_anne.following);
        assert!(!seen_by_jake.following);
        assert!(!anonymous.following);

        assert!(!app.identity.unfollow(anne.user.id, "jake").await.unwrap().following);
        assert!(!app.identity.unfollow(anne.user.id, "jake").await.unwrap().following);
        let seen_by_anne = app.identity.get_profile(Some(anne.user.id), "jake").await.unwrap();
        assert!(!seen_by_anne.following);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_follows_all_land() {
        let file = TempDatabase::new();
        let app = file_app(&file).await;
        register(&app, "jake").await;
        let mut followers = Vec::new();
        for i in 0..16 {
            followers.push(register(&app, &format!("fan{i}")).await.user.id);
        }

        let tasks: Vec<_> = followers
            .iter()
            .map(|&id| {
                let app = app.clone();
                tokio::spawn(async move { app.identity.follow(id, "jake").await })
            })
            .collect();
        for task in tasks {
            assert!(task.await.unwrap().unwrap().following);
        }

        for id in followers {
            let seen = app.identity.get_profile(Some(id), "jake").await.unwrap();
            assert!(seen.following);
        }
    }

    #[tokio::test]
    async fn unknown_and_self_follows_are_rejected() {
        let app = app().await;
        let jake = register(&app, "jake").await;

        let error = app.identity.follow(jake.user.id, "nobody").await.unwrap_err();
        assert!(matches!(error, RequestError::NotFound(_)));
        let error = app.identity.follow(jake.user.id, "jake").await.unwrap_err();
        assert!(matches!(error, RequestError::Validation(_)));
    }
}
