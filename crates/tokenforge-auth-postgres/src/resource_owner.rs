//! Resource owners, profiles and addresses.

use async_trait::async_trait;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use time::{Date, OffsetDateTime};
use tokenforge_auth::storage::{ResourceOwnerStorage, StorageError, StorageResult};
use tokenforge_auth::types::{Address, Profile, ResourceOwner};
use url::Url;
use uuid::Uuid;

use crate::{PostgresAuthStorage, backend_error, map_db_error};

type ResourceOwnerTuple = (Uuid, String, String, bool, OffsetDateTime);

type ProfileTuple = (
    Uuid,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<Date>,
    Option<String>,
    Option<String>,
    Option<String>,
    bool,
    OffsetDateTime,
);

type AddressTuple = (
    Uuid,
    String,
    Option<String>,
    String,
    String,
    String,
    String,
);

fn resource_owner_from_tuple(row: ResourceOwnerTuple) -> ResourceOwner {
    ResourceOwner {
        id: row.0,
        email: row.1,
        password_hash: row.2,
        email_verified: row.3,
        created_at: row.4,
    }
}

fn address_from_tuple(row: AddressTuple) -> Address {
    Address {
        id: row.0,
        street_address: row.1,
        street_address2: row.2,
        locality: row.3,
        region: row.4,
        postal_code: row.5,
        country: row.6,
    }
}

fn parse_url(value: Option<String>) -> StorageResult<Option<Url>> {
    value
        .as_deref()
        .map(Url::parse)
        .transpose()
        .map_err(backend_error)
}

fn profile_from_tuple(
    row: ProfileTuple,
    resource_owner: ResourceOwner,
    addresses: Vec<Address>,
) -> StorageResult<Profile> {
    Ok(Profile {
        id: row.0,
        resource_owner,
        name: row.1,
        middle_name: row.2,
        nick_name: row.3,
        preferred_user_name: row.4,
        given_name: row.5,
        family_name: row.6,
        gender: row.7,
        birth_date: row.8,
        picture: parse_url(row.9)?,
        website: parse_url(row.10)?,
        phone_number: row.11,
        phone_number_verified: row.12,
        updated_at: row.13,
        addresses,
    })
}

#[async_trait]
impl ResourceOwnerStorage for PostgresAuthStorage {
    async fn insert(&self, resource_owner: &ResourceOwner) -> StorageResult<()> {
        query(
            r#"
            INSERT INTO resource_owner (id, email, password_hash, email_verified, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(resource_owner.id)
        .bind(&resource_owner.email)
        .bind(&resource_owner.password_hash)
        .bind(resource_owner.email_verified)
        .bind(resource_owner.created_at)
        .execute(self.pool())
        .await
        .map_err(|e| map_db_error("resource_owner", e))?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> StorageResult<Option<ResourceOwner>> {
        let row: Option<ResourceOwnerTuple> = query_as(
            r#"
            SELECT id, email, password_hash, email_verified, created_at
            FROM resource_owner
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| map_db_error("resource_owner", e))?;

        Ok(row.map(resource_owner_from_tuple))
    }

    async fn find_by_email(&self, email: &str) -> StorageResult<Option<ResourceOwner>> {
        let row: Option<ResourceOwnerTuple> = query_as(
            r#"
            SELECT id, email, password_hash, email_verified, created_at
            FROM resource_owner
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| map_db_error("resource_owner", e))?;

        Ok(row.map(resource_owner_from_tuple))
    }

    async fn set_email_verified(&self, id: Uuid) -> StorageResult<()> {
        let updated = query("UPDATE resource_owner SET email_verified = TRUE WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(|e| map_db_error("resource_owner", e))?
            .rows_affected();

        if updated == 0 {
            return Err(StorageError::not_found("resource_owner"));
        }
        Ok(())
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> StorageResult<()> {
        let updated = query("UPDATE resource_owner SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(self.pool())
            .await
            .map_err(|e| map_db_error("resource_owner", e))?
            .rows_affected();

        if updated == 0 {
            return Err(StorageError::not_found("resource_owner"));
        }
        Ok(())
    }

    async fn insert_profile(&self, profile: &Profile) -> StorageResult<()> {
        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| map_db_error("profile", e))?;

        query(
            r#"
            INSERT INTO profile (
                id, resource_owner_id, name, middle_name, nick_name, preferred_user_name,
                given_name, family_name, gender, birth_date, picture, website,
                phone_number, phone_number_verified, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(profile.id)
        .bind(profile.resource_owner.id)
        .bind(&profile.name)
        .bind(&profile.middle_name)
        .bind(&profile.nick_name)
        .bind(&profile.preferred_user_name)
        .bind(&profile.given_name)
        .bind(&profile.family_name)
        .bind(&profile.gender)
        .bind(profile.birth_date)
        .bind(profile.picture.as_ref().map(Url::as_str))
        .bind(profile.website.as_ref().map(Url::as_str))
        .bind(&profile.phone_number)
        .bind(profile.phone_number_verified)
        .bind(profile.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_db_error("profile", e))?;

        for (position, address) in profile.addresses.iter().enumerate() {
            query(
                r#"
                INSERT INTO address (
                    id, profile_id, position, street_address, street_address2,
                    locality, region, postal_code, country
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(address.id)
            .bind(profile.id)
            .bind(i32::try_from(position).map_err(backend_error)?)
            .bind(&address.street_address)
            .bind(&address.street_address2)
            .bind(&address.locality)
            .bind(&address.region)
            .bind(&address.postal_code)
            .bind(&address.country)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_db_error("address", e))?;
        }

        tx.commit().await.map_err(|e| map_db_error("profile", e))?;
        Ok(())
    }

    async fn find_profile(&self, resource_owner_id: Uuid) -> StorageResult<Option<Profile>> {
        let Some(resource_owner) = ResourceOwnerStorage::find_by_id(self, resource_owner_id).await?
        else {
            return Ok(None);
        };

        let row: Option<ProfileTuple> = query_as(
            r#"
            SELECT id, name, middle_name, nick_name, preferred_user_name, given_name,
                   family_name, gender, birth_date, picture, website, phone_number,
                   phone_number_verified, updated_at
            FROM profile
            WHERE resource_owner_id = $1
            "#,
        )
        .bind(resource_owner_id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| map_db_error("profile", e))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let addresses: Vec<AddressTuple> = query_as(
            r#"
            SELECT id, street_address, street_address2, locality, region, postal_code, country
            FROM address
            WHERE profile_id = $1
            ORDER BY position
            "#,
        )
        .bind(row.0)
        .fetch_all(self.pool())
        .await
        .map_err(|e| map_db_error("address", e))?;

        let addresses = addresses.into_iter().map(address_from_tuple).collect();
        profile_from_tuple(row, resource_owner, addresses).map(Some)
    }
}
