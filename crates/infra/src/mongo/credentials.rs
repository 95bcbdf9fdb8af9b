use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::{DateTime as BsonDateTime, doc};
use mongodb::options::IndexOptions;
use mongodb::{Collection, Database, IndexModel};
use serde::{Deserialize, Serialize};

use moviestream_auth::{CredentialStore, Identity, RevocationRecord, Role, StoreError};
use moviestream_core::{TokenId, UserId};

use super::is_duplicate_key;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IdentityDoc {
    #[serde(rename = "_id")]
    user_id: String,
    email: String,
    first_name: String,
    last_name: String,
    password_hash: String,
    role: Role,
    #[serde(default)]
    favourite_genres: Vec<String>,
    created_at: BsonDateTime,
}

/// One document per revoked refresh token; MongoDB's TTL monitor removes it
/// once `expires_at` has passed.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RevocationDoc {
    #[serde(rename = "_id")]
    token_id: String,
    revoked_at: BsonDateTime,
    expires_at: BsonDateTime,
}

#[derive(Debug, Clone)]
pub struct MongoCredentialStore {
    db: Database,
    users: Collection<IdentityDoc>,
    revocations: Collection<RevocationDoc>,
}

impl MongoCredentialStore {
    pub fn new(db: &Database) -> Self {
        Self {
            db: db.clone(),
            users: db.collection("users"),
            revocations: db.collection("revoked_tokens"),
        }
    }

    pub async fn ensure_indexes(&self) -> mongodb::error::Result<()> {
        self.users
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "email": 1 })
                    .options(IndexOptions::builder().unique(true).build())
                    .build(),
            )
            .await?;
        self.revocations
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "expires_at": 1 })
                    .options(
                        IndexOptions::builder()
                            .expire_after(Duration::from_secs(0))
                            .build(),
                    )
                    .build(),
            )
            .await?;
        Ok(())
    }
}

fn to_bson_time(at: DateTime<Utc>) -> BsonDateTime {
    BsonDateTime::from_millis(at.timestamp_millis())
}

fn from_bson_time(at: BsonDateTime) -> Result<DateTime<Utc>, StoreError> {
    DateTime::<Utc>::from_timestamp_millis(at.timestamp_millis())
        .ok_or_else(|| StoreError::unavailable("stored timestamp out of range"))
}

fn unavailable(err: mongodb::error::Error) -> StoreError {
    StoreError::unavailable(err.to_string())
}

impl From<&Identity> for IdentityDoc {
    fn from(identity: &Identity) -> Self {
        Self {
            user_id: identity.user_id.to_string(),
            email: identity.email.clone(),
            first_name: identity.first_name.clone(),
            last_name: identity.last_name.clone(),
            password_hash: identity.password_hash.clone(),
            role: identity.role,
            favourite_genres: identity.favourite_genres.clone(),
            created_at: to_bson_time(identity.created_at),
        }
    }
}

impl TryFrom<IdentityDoc> for Identity {
    type Error = StoreError;

    fn try_from(doc: IdentityDoc) -> Result<Self, Self::Error> {
        let user_id: UserId = doc
            .user_id
            .parse()
            .map_err(|e| StoreError::unavailable(format!("corrupt user document: {e}")))?;
        Ok(Identity {
            user_id,
            email: doc.email,
            first_name: doc.first_name,
            last_name: doc.last_name,
            password_hash: doc.password_hash,
            role: doc.role,
            favourite_genres: doc.favourite_genres,
            created_at: from_bson_time(doc.created_at)?,
        })
    }
}

#[async_trait]
impl CredentialStore for MongoCredentialStore {
    async fn find_identity_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Identity>, StoreError> {
        self.users
            .find_one(doc! { "email": username })
            .await
            .map_err(unavailable)?
            .map(Identity::try_from)
            .transpose()
    }

    async fn find_identity_by_id(&self, user_id: UserId) -> Result<Option<Identity>, StoreError> {
        self.users
            .find_one(doc! { "_id": user_id.to_string() })
            .await
            .map_err(unavailable)?
            .map(Identity::try_from)
            .transpose()
    }

    async fn insert_identity(&self, identity: Identity) -> Result<(), StoreError> {
        match self.users.insert_one(IdentityDoc::from(&identity)).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => Err(StoreError::Conflict(identity.email)),
            Err(e) => Err(unavailable(e)),
        }
    }

    async fn insert_revocation(&self, record: RevocationRecord) -> Result<(), StoreError> {
        self.revocations
            .update_one(
                doc! { "_id": record.token_id.to_string() },
                doc! { "$setOnInsert": {
                    "revoked_at": to_bson_time(record.revoked_at),
                    "expires_at": to_bson_time(record.expires_at),
                }},
            )
            .upsert(true)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn is_revoked(&self, token_id: TokenId) -> Result<bool, StoreError> {
        let count = self
            .revocations
            .count_documents(doc! { "_id": token_id.to_string() })
            .await
            .map_err(unavailable)?;
        Ok(count > 0)
    }

    async fn purge_expired_revocations(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = self
            .revocations
            .delete_many(doc! { "expires_at": { "$lte": to_bson_time(now) } })
            .await
            .map_err(unavailable)?;
        Ok(result.deleted_count)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.db
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(unavailable)?;
        Ok(())
    }
}
