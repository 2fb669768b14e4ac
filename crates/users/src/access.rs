//! Forum and group access checks.
//!
//! All checks run against a *resolved* user: either the request's active
//! user or a detailed fetch of an explicitly named account. Administrators
//! pass every forum check and hold moderator status in every group; accounts
//! outside the `Active` state are denied everything.

use std::borrow::Cow;
use std::collections::BTreeMap;

use tribune_core::{
    ApiResult, ForumId, Group, GroupId, GroupLevel, Permissions, RequestContext, UserRecord,
};
use tribune_store::ForumDefaults;

use crate::repo::UserRepo;

/// Whose access is being checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessUser {
    /// The request's active user (the anonymous user when nobody is
    /// signed in).
    Active,
    /// An explicitly named account, fetched in detail for the check.
    Id(tribune_core::UserId),
}

/// Forum selector for a single yes/no check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForumScope {
    /// The forum the request is currently visiting.
    Current,
    Forum(ForumId),
}

/// Forum selector for a filtering check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForumListScope {
    Forums(Vec<ForumId>),
    All,
}

/// One granted group from [`UserRepo::list_group_access`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupAccess {
    pub group: Group,
    /// The user's level in the group; `Moderator` for administrators.
    pub user_status: GroupLevel,
}

impl UserRepo {
    /// `true` when the user holds every bit of `required` in the forum.
    ///
    /// An unresolvable user or forum denies. `Current` with no forum on the
    /// request denies as well.
    pub fn check_forum_access(
        &self,
        ctx: &RequestContext,
        required: Permissions,
        scope: ForumScope,
        user: AccessUser,
    ) -> ApiResult<bool> {
        let forum = match scope {
            ForumScope::Forum(id) => id,
            ForumScope::Current => match ctx.current_forum {
                Some(id) => id,
                None => return Ok(false),
            },
        };

        let Some(user) = self.resolve_access_user(ctx, user)? else {
            return Ok(false);
        };
        if denied_outright(&user) {
            return Ok(false);
        }
        if user.admin {
            return Ok(true);
        }

        let defaults = self.store().forums(Some(&[forum]))?;
        Ok(mask_for(&user, forum, &defaults).grants(required))
    }

    /// `true` when the user holds `required` in at least one forum.
    pub fn check_any_forum_access(
        &self,
        ctx: &RequestContext,
        required: Permissions,
        user: AccessUser,
    ) -> ApiResult<bool> {
        let Some(user) = self.resolve_access_user(ctx, user)? else {
            return Ok(false);
        };
        if denied_outright(&user) {
            return Ok(false);
        }
        if user.admin {
            return Ok(true);
        }

        let defaults = self.store().forums(None)?;
        for &forum in defaults.keys() {
            if mask_for(&user, forum, &defaults).grants(required) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// The subset of the scoped forums where the user holds `required`,
    /// ascending by forum id.
    pub fn list_forum_access(
        &self,
        ctx: &RequestContext,
        required: Permissions,
        scope: ForumListScope,
        user: AccessUser,
    ) -> ApiResult<Vec<ForumId>> {
        let Some(user) = self.resolve_access_user(ctx, user)? else {
            return Ok(Vec::new());
        };

        let defaults = match &scope {
            ForumListScope::Forums(ids) => self.store().forums(Some(ids))?,
            ForumListScope::All => self.store().forums(None)?,
        };
        if denied_outright(&user) {
            return Ok(Vec::new());
        }
        if user.admin {
            return Ok(defaults.keys().copied().collect());
        }

        Ok(defaults
            .keys()
            .copied()
            .filter(|&forum| mask_for(&user, forum, &defaults).grants(required))
            .collect())
    }

    /// `true` when the user holds at least `required` level in the group.
    ///
    /// Suspended memberships never grant, missing groups deny, and an
    /// administrator passes for any group that exists.
    pub fn check_group_access(
        &self,
        ctx: &RequestContext,
        required: GroupLevel,
        group_id: GroupId,
        user: AccessUser,
    ) -> ApiResult<bool> {
        let Some(user) = self.resolve_access_user(ctx, user)? else {
            return Ok(false);
        };
        if denied_outright(&user) {
            return Ok(false);
        }

        let groups = self.store().groups(Some(&[group_id]))?;
        if !groups.contains_key(&group_id) {
            return Ok(false);
        }
        if user.admin {
            return Ok(true);
        }

        let memberships = self.memberships_of(&user)?;
        let Some(&level) = memberships.get(&group_id) else {
            return Ok(false);
        };
        Ok(level != GroupLevel::Suspended && level >= required)
    }

    /// All groups where the user holds at least `required` level, keyed by
    /// group id. Administrators get every group at `Moderator` status.
    pub fn list_group_access(
        &self,
        ctx: &RequestContext,
        required: GroupLevel,
        user: AccessUser,
    ) -> ApiResult<BTreeMap<GroupId, GroupAccess>> {
        let Some(user) = self.resolve_access_user(ctx, user)? else {
            return Ok(BTreeMap::new());
        };
        if denied_outright(&user) {
            return Ok(BTreeMap::new());
        }

        if user.admin {
            let groups = self.store().groups(None)?;
            return Ok(groups
                .into_iter()
                .map(|(id, group)| {
                    (
                        id,
                        GroupAccess {
                            group,
                            user_status: GroupLevel::Moderator,
                        },
                    )
                })
                .collect());
        }

        let memberships = self.memberships_of(&user)?;
        let group_ids: Vec<GroupId> = memberships.keys().copied().collect();
        let groups = if group_ids.is_empty() {
            BTreeMap::new()
        } else {
            self.store().groups(Some(&group_ids))?
        };

        let mut out = BTreeMap::new();
        for (group_id, level) in memberships {
            // memberships pointing at deleted groups are skipped
            let Some(group) = groups.get(&group_id) else { continue };
            if level == GroupLevel::Suspended || level < required {
                continue;
            }
            out.insert(
                group_id,
                GroupAccess {
                    group: group.clone(),
                    user_status: level,
                },
            );
        }
        Ok(out)
    }

    fn resolve_access_user<'a>(
        &self,
        ctx: &'a RequestContext,
        user: AccessUser,
    ) -> ApiResult<Option<Cow<'a, UserRecord>>> {
        Ok(match user {
            AccessUser::Active => Some(Cow::Borrowed(ctx.user())),
            AccessUser::Id(id) => self.get_one(id, true)?.map(Cow::Owned),
        })
    }

    fn memberships_of(&self, user: &UserRecord) -> ApiResult<BTreeMap<GroupId, GroupLevel>> {
        if user.is_anonymous() {
            return Ok(BTreeMap::new());
        }
        Ok(self.store().group_memberships(user.user_id)?)
    }
}

/// Real accounts outside the `Active` state hold no access at all. The
/// anonymous user is not an account and falls through to the public
/// permission defaults instead.
fn denied_outright(user: &UserRecord) -> bool {
    !user.is_anonymous() && !user.active.is_active()
}

/// Permission mask of `user` in `forum`: the user's effective mask when one
/// is recorded for the forum, otherwise the forum's default for anonymous or
/// registered visitors.
fn mask_for(
    user: &UserRecord,
    forum: ForumId,
    defaults: &BTreeMap<ForumId, ForumDefaults>,
) -> Permissions {
    if let Some(mask) = user.permissions_for(forum) {
        return mask;
    }
    match defaults.get(&forum) {
        Some(d) if user.is_anonymous() => d.public_permissions,
        Some(d) => d.registered_permissions,
        None => Permissions::empty(),
    }
}
