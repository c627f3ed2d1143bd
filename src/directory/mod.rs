//! Group directory and member identity collaborators
//!
//! The engine only needs lookups; creating groups, joining by code and
//! issuing tokens belong to external services. `InMemoryDirectory` stands in
//! for them in tests and in `convoy serve --demo`.

use async_trait::async_trait;
use dashmap::DashMap;
use rand::Rng;
use std::collections::BTreeSet;
use tracing::info;
use uuid::Uuid;

use crate::domain::{Group, GroupId, Member, MemberId};
use crate::error::{ConvoyError, Result};

#[async_trait]
pub trait GroupDirectory: Send + Sync {
    async fn group(&self, group_id: &GroupId) -> Option<Group>;

    /// Resolve a human-entered join code
    async fn resolve_code(&self, code: &str) -> Option<GroupId>;

    async fn member(&self, member_id: &MemberId) -> Option<Member>;

    /// Map a bearer token to the member it identifies
    async fn authenticate(&self, token: &str) -> Option<MemberId>;
}

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const CODE_LEN: usize = 6;

#[derive(Default)]
pub struct InMemoryDirectory {
    members: DashMap<MemberId, Member>,
    tokens: DashMap<String, MemberId>,
    groups: DashMap<GroupId, Group>,
    codes: DashMap<String, GroupId>,
    memberships: DashMap<GroupId, BTreeSet<MemberId>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a member and issue a bearer token for it
    pub fn register_member(&self, display_name: &str) -> (Member, String) {
        let member = Member {
            id: MemberId::new(Uuid::new_v4().to_string()),
            display_name: display_name.to_string(),
        };
        let token = Uuid::new_v4().simple().to_string();
        self.members.insert(member.id.clone(), member.clone());
        self.tokens.insert(token.clone(), member.id.clone());
        (member, token)
    }

    pub fn create_group(&self, name: &str, creator: &MemberId) -> Group {
        let code = loop {
            let candidate = random_code();
            if !self.codes.contains_key(&candidate) {
                break candidate;
            }
        };

        let group = Group {
            id: GroupId::new(Uuid::new_v4().to_string()),
            name: name.to_string(),
            code: code.clone(),
        };
        self.groups.insert(group.id.clone(), group.clone());
        self.codes.insert(code, group.id.clone());
        self.memberships
            .entry(group.id.clone())
            .or_default()
            .insert(creator.clone());

        info!(group = %group.id, code = %group.code, "group created");
        group
    }

    /// Add a member to the group behind `code`; joining twice is harmless
    pub fn join_group(&self, code: &str, member_id: &MemberId) -> Result<Group> {
        let group_id = self
            .codes
            .get(&code.trim().to_ascii_uppercase())
            .map(|id| id.clone())
            .ok_or_else(|| ConvoyError::not_found(format!("group code {code}")))?;
        let group = self
            .groups
            .get(&group_id)
            .map(|g| g.clone())
            .ok_or_else(|| ConvoyError::Internal(format!("code {code} points at missing group")))?;

        self.memberships
            .entry(group_id)
            .or_default()
            .insert(member_id.clone());
        Ok(group)
    }

    pub fn members_of(&self, group_id: &GroupId) -> Vec<MemberId> {
        self.memberships
            .get(group_id)
            .map(|m| m.iter().cloned().collect())
            .unwrap_or_default()
    }
}

fn random_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

#[async_trait]
impl GroupDirectory for InMemoryDirectory {
    async fn group(&self, group_id: &GroupId) -> Option<Group> {
        self.groups.get(group_id).map(|g| g.clone())
    }

    async fn resolve_code(&self, code: &str) -> Option<GroupId> {
        self.codes
            .get(&code.trim().to_ascii_uppercase())
            .map(|id| id.clone())
    }

    async fn member(&self, member_id: &MemberId) -> Option<Member> {
        self.members.get(member_id).map(|m| m.clone())
    }

    async fn authenticate(&self, token: &str) -> Option<MemberId> {
        self.tokens.get(token).map(|id| id.clone())
    }
}
