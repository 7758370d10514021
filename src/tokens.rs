//! Checks on verification tokens presented by users and invited voters.

use chrono::{DateTime, Utc};
use log::{debug, info};

use crate::{
    error::{Error, Result},
    model::{
        api::InvitationDescription,
        common::{TokenOwner, TokenType},
        db::TokenId,
    },
    store::Store,
};

/// Verify an account token.
///
/// Email verification tokens are consumed: the owning user is marked
/// verified and all of their email verification tokens are deleted.
/// Password reset tokens are only checked; the reset itself consumes them.
pub async fn verify_account_token(
    store: &dyn Store,
    kind: TokenType,
    id: &TokenId,
    now: DateTime<Utc>,
) -> Result<TokenType> {
    if kind == TokenType::ElectionInvitation {
        return Err(Error::BadRequest(
            "Invitations cannot be verified here".to_string(),
        ));
    }

    let token = store
        .token(id)
        .await?
        .filter(|token| token.kind == kind)
        .ok_or_else(|| Error::not_found("Token not found"))?;
    if token.is_expired(now) {
        return Err(Error::Forbidden("Token expired".to_string()));
    }

    if let (TokenType::EmailVerification, TokenOwner::User(user)) = (kind, token.owner) {
        store.mark_email_verified(user, now).await?;
        let deleted = store.delete_tokens(token.owner, kind).await?;
        info!("Verified email of user {user}, consumed {deleted} tokens");
    }
    Ok(kind)
}

/// Look up an invitation token on behalf of the invited voter or
/// commissioner with `email`.
///
/// Tokens that do not exist, are not invitations or belong to someone else
/// are all reported as not found.
pub async fn lookup_invitation(
    store: &dyn Store,
    id: &TokenId,
    email: &str,
    now: DateTime<Utc>,
) -> Result<InvitationDescription> {
    let not_found = || Error::not_found("Token not found");

    let token = store
        .token(id)
        .await?
        .filter(|token| token.kind == TokenType::ElectionInvitation)
        .ok_or_else(not_found)?;
    // (email, election) of whoever the invitation was issued to.
    let invitee = match token.owner {
        TokenOwner::InvitedVoter(voter) => store
            .invited_voter(voter)
            .await?
            .map(|voter| (voter.email, voter.election_id)),
        TokenOwner::InvitedCommissioner(commissioner) => store
            .invited_commissioner(commissioner)
            .await?
            .map(|commissioner| (commissioner.email, commissioner.election_id)),
        TokenOwner::User(_) => None,
    };
    let election_id = invitee
        .filter(|(invited, _)| invited.eq_ignore_ascii_case(email))
        .map(|(_, election_id)| election_id)
        .ok_or_else(|| {
            debug!("Invitation {id} does not belong to {email}");
            not_found()
        })?;
    if token.is_expired(now) {
        return Err(Error::Forbidden("Token expired".to_string()));
    }

    let election = store.election(election_id).await?.ok_or_else(|| {
        Error::Inconsistent(format!(
            "Invitee {} belongs to missing election {election_id}",
            token.owner.id()
        ))
    })?;
    Ok(InvitationDescription {
        token: token.id,
        kind: token.kind,
        expires_at: token.expires_at,
        election: election.into(),
    })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::{
        model::db::{Election, InvitedCommissioner, InvitedVoter, User, VerificationToken},
        store::MemoryStore,
    };

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    async fn user_with_token(store: &MemoryStore, kind: TokenType) -> (User, VerificationToken) {
        let user = User {
            id: Default::default(),
            email: "user@example.com".to_string(),
            email_verified: None,
        };
        store.insert_user(user.clone()).await;
        let token = VerificationToken::new(kind, TokenOwner::User(user.id), now() + Duration::hours(1));
        store.insert_token(&token).await.unwrap();
        (user, token)
    }

    #[rocket::async_test]
    async fn email_verification_consumes_all_tokens() {
        let store = MemoryStore::new();
        let (user, token) = user_with_token(&store, TokenType::EmailVerification).await;
        let other = VerificationToken::new(
            TokenType::EmailVerification,
            TokenOwner::User(user.id),
            now() + Duration::hours(2),
        );
        store.insert_token(&other).await.unwrap();

        let verified = verify_account_token(&store, TokenType::EmailVerification, &token.id, now())
            .await
            .unwrap();

        assert_eq!(verified, TokenType::EmailVerification);
        assert!(store.user(user.id).await.unwrap().unwrap().email_verified.is_some());
        assert!(store.tokens_owned_by(TokenOwner::User(user.id)).await.is_empty());
    }

    #[rocket::async_test]
    async fn password_reset_tokens_are_only_checked() {
        let store = MemoryStore::new();
        let (user, token) = user_with_token(&store, TokenType::PasswordReset).await;

        verify_account_token(&store, TokenType::PasswordReset, &token.id, now())
            .await
            .unwrap();

        assert!(store.user(user.id).await.unwrap().unwrap().email_verified.is_none());
        assert_eq!(store.tokens_owned_by(TokenOwner::User(user.id)).await.len(), 1);
    }

    #[rocket::async_test]
    async fn wrong_type_unknown_and_expired_tokens_are_rejected() {
        let store = MemoryStore::new();
        let (_, token) = user_with_token(&store, TokenType::PasswordReset).await;

        let wrong_type =
            verify_account_token(&store, TokenType::EmailVerification, &token.id, now()).await;
        assert!(matches!(wrong_type, Err(Error::NotFound(_))));

        let unknown =
            verify_account_token(&store, TokenType::PasswordReset, &TokenId::random(), now()).await;
        assert!(matches!(unknown, Err(Error::NotFound(_))));

        let later = now() + Duration::hours(2);
        let expired = verify_account_token(&store, TokenType::PasswordReset, &token.id, later).await;
        assert!(matches!(expired, Err(Error::Forbidden(_))));

        let invitation =
            verify_account_token(&store, TokenType::ElectionInvitation, &token.id, now()).await;
        assert!(matches!(invitation, Err(Error::BadRequest(_))));
    }

    #[rocket::async_test]
    async fn invitation_lookup_is_scoped_to_the_invited_email() {
        let store = MemoryStore::new();
        let election = Election::example();
        store.insert_election(election.clone()).await;
        let voter = InvitedVoter::new(election.id, "voter@example.com");
        store.insert_voter(voter.clone()).await;
        let token = VerificationToken::new(
            TokenType::ElectionInvitation,
            TokenOwner::InvitedVoter(voter.id),
            now() + Duration::hours(1),
        );
        store.insert_token(&token).await.unwrap();

        let found = lookup_invitation(&store, &token.id, "Voter@Example.com", now())
            .await
            .unwrap();
        assert_eq!(found.token, token.id);
        assert_eq!(found.election.slug, election.slug);

        let stranger = lookup_invitation(&store, &token.id, "other@example.com", now()).await;
        assert!(matches!(stranger, Err(Error::NotFound(_))));

        let later = now() + Duration::hours(2);
        let expired = lookup_invitation(&store, &token.id, "voter@example.com", later).await;
        assert!(matches!(expired, Err(Error::Forbidden(_))));
    }

    #[rocket::async_test]
    async fn commissioner_invitations_resolve_to_their_election() {
        let store = MemoryStore::new();
        let election = Election::example();
        store.insert_election(election.clone()).await;
        let commissioner = InvitedCommissioner::new(election.id, "commissioner@example.com");
        store.insert_commissioner(commissioner.clone()).await;
        let token = VerificationToken::new(
            TokenType::ElectionInvitation,
            TokenOwner::InvitedCommissioner(commissioner.id),
            now() + Duration::hours(1),
        );
        store.insert_token(&token).await.unwrap();

        let found = lookup_invitation(&store, &token.id, "commissioner@example.com", now())
            .await
            .unwrap();
        assert_eq!(found.token, token.id);
        assert_eq!(found.election.slug, election.slug);

        let stranger = lookup_invitation(&store, &token.id, "voter@example.com", now()).await;
        assert!(matches!(stranger, Err(Error::NotFound(_))));
    }
}
