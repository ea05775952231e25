//! Invite code and team membership actions for one startup at a time.
//!
//! Role checks here are advisory: they keep the UI from offering actions the
//! backend would refuse. The backend re-validates every request.

use super::types::InviteCode;
use crate::auth::{RequestGate, RequestTicket};
use crate::error::Result as ApiResult;
use crate::session::{ListenerHandle, Session, SessionStore};
use crate::tenants::{Member, Result, Startup, StartupRole, TenantError};
use crate::traits::workspace::WorkspaceApi;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, instrument, warn};

/// Fallback shown when regeneration fails without a backend detail.
pub const REGENERATE_FAILED: &str = "Failed to regenerate";
/// Fallback shown when removal fails without a backend detail.
pub const REMOVE_FAILED: &str = "Failed to remove";

#[derive(Debug, Default)]
struct CodeSlot {
    code: Option<String>,
    requests: RequestGate,
    rotating: usize,
    last_rotation: Option<RequestTicket>,
}

/// Displayed codes for the current session. `epoch` moves on every clear so
/// results for an earlier session are never committed.
#[derive(Debug, Default)]
struct Displayed {
    epoch: u64,
    slots: HashMap<String, CodeSlot>,
}

impl Displayed {
    fn code(&self, startup_id: &str) -> Option<InviteCode> {
        self.slots
            .get(startup_id)
            .and_then(|slot| slot.code.as_ref())
            .map(|code| InviteCode::new(startup_id, code.clone()))
    }
}

/// Manages invite codes and members of the caller's startups.
///
/// Keeps the code currently displayed per startup. A successful regeneration
/// swaps it in one step; a failed one evicts it, since the old code may no
/// longer be valid. A fetch that overlaps a regeneration never replaces the
/// displayed code: it may have read the code the regeneration invalidated.
pub struct InviteManager {
    api: Arc<dyn WorkspaceApi>,
    displayed: Mutex<Displayed>,
    session_listener: Mutex<Option<ListenerHandle>>,
}

impl InviteManager {
    pub fn new(api: Arc<dyn WorkspaceApi>) -> Self {
        Self {
            api,
            displayed: Mutex::new(Displayed::default()),
            session_listener: Mutex::new(None),
        }
    }

    fn displayed(&self) -> MutexGuard<'_, Displayed> {
        self.displayed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The code currently shown for `startup_id`, if any.
    pub fn displayed_code(&self, startup_id: &str) -> Option<InviteCode> {
        self.displayed().code(startup_id)
    }

    /// Drop the displayed code for `startup_id`.
    pub fn forget(&self, startup_id: &str) {
        if let Some(slot) = self.displayed().slots.get_mut(startup_id) {
            slot.code = None;
        }
    }

    /// Drop every displayed code and discard results still in flight.
    pub fn clear(&self) {
        let mut displayed = self.displayed();
        displayed.epoch += 1;
        displayed.slots.clear();
        debug!(epoch = displayed.epoch, "Invite codes cleared");
    }

    /// Clear displayed codes whenever `sessions` signs out or switches user.
    ///
    /// Replaces any earlier subscription. The store only holds a weak
    /// reference to the manager.
    pub fn follow_sessions(self: &Arc<Self>, sessions: &SessionStore) {
        let manager = Arc::downgrade(self);
        let last_user = Mutex::new(sessions.current().map(|s| s.user_id().to_string()));

        let handle = sessions.on_session_change(move |session| {
            let user = session.map(|s| s.user_id().to_string());
            let mut last = last_user.lock().unwrap_or_else(PoisonError::into_inner);
            if user.is_none() || *last != user {
                if let Some(manager) = manager.upgrade() {
                    manager.clear();
                }
            }
            *last = user;
        });

        *self
            .session_listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    fn begin_fetch(&self, startup_id: &str) -> (RequestTicket, bool) {
        let mut displayed = self.displayed();
        let epoch = displayed.epoch;
        let slot = displayed.slots.entry(startup_id.to_string()).or_default();
        (slot.requests.issue(epoch), slot.rotating > 0)
    }

    /// Commit a fetched code unless a regeneration or a newer fetch overlapped
    /// it. Returns what is displayed afterwards.
    fn finish_fetch(
        &self,
        startup_id: &str,
        ticket: RequestTicket,
        overlapped: bool,
        code: Option<String>,
    ) -> Option<InviteCode> {
        let mut displayed = self.displayed();
        let epoch = displayed.epoch;
        if ticket.generation != epoch {
            debug!("Discarding invite code fetched for a previous session");
            return None;
        }

        let slot = displayed.slots.entry(startup_id.to_string()).or_default();
        if overlapped || slot.rotating > 0 || !slot.requests.admits(ticket, epoch) {
            debug!("Discarding superseded invite code");
        } else {
            slot.code = code;
        }
        displayed.code(startup_id)
    }

    fn begin_rotation(&self, startup_id: &str) -> RequestTicket {
        let mut displayed = self.displayed();
        let epoch = displayed.epoch;
        let slot = displayed.slots.entry(startup_id.to_string()).or_default();
        let ticket = slot.requests.issue(epoch);
        slot.rotating += 1;
        slot.last_rotation = Some(ticket);
        ticket
    }

    fn finish_rotation(&self, startup_id: &str, ticket: RequestTicket, result: &ApiResult<String>) {
        let mut displayed = self.displayed();
        if ticket.generation != displayed.epoch {
            return;
        }

        let slot = displayed.slots.entry(startup_id.to_string()).or_default();
        slot.rotating = slot.rotating.saturating_sub(1);
        match result {
            Ok(code) if slot.last_rotation == Some(ticket) => slot.code = Some(code.clone()),
            Ok(_) => debug!("A later regeneration owns the displayed code"),
            // Outcome unknown: the displayed code may already be dead
            Err(_) => slot.code = None,
        }
    }

    /// Whether the remove action should be offered for `member`.
    ///
    /// `actor` is the startup as seen by the caller (carrying the caller's
    /// role). Founders are never removable.
    pub fn can_remove(actor: &Startup, member: &Member) -> bool {
        actor.user_role.is_founder()
            && actor.user_role.permissions().can_manage_team
            && member.role != StartupRole::Founder
    }

    /// Fetch the startup's active invite code.
    ///
    /// Returns the same code on every call until it is regenerated. A missing
    /// code is `Ok(None)`; a failed fetch is logged and falls back to the
    /// code already displayed.
    #[instrument(skip_all, fields(startup_id = %startup.id))]
    pub async fn get_or_create_code(
        &self,
        session: &Session,
        startup: &Startup,
    ) -> Result<Option<InviteCode>> {
        require_team_manager(startup)?;

        let (ticket, overlapped) = self.begin_fetch(&startup.id);
        match self
            .api
            .get_invite_code(&session.access_token, &startup.id)
            .await
        {
            Ok(code) => {
                if code.is_none() {
                    debug!("Startup has no invite code");
                }
                Ok(self.finish_fetch(&startup.id, ticket, overlapped, code))
            }
            Err(e) => {
                warn!(
                    target: "invites.fetch_failed",
                    error = %e,
                    "Failed to fetch invite code"
                );
                Ok(self.displayed_code(&startup.id))
            }
        }
    }

    /// Replace the startup's invite code. The previous code stops working.
    ///
    /// Not idempotent: every successful call yields a new code.
    #[instrument(skip_all, fields(startup_id = %startup.id))]
    pub async fn regenerate(&self, session: &Session, startup: &Startup) -> Result<InviteCode> {
        require_founder(startup)?;

        let ticket = self.begin_rotation(&startup.id);
        let result = self
            .api
            .regenerate_invite_code(&session.access_token, &startup.id)
            .await;
        self.finish_rotation(&startup.id, ticket, &result);

        match result {
            Ok(code) => {
                info!("Invite code regenerated");
                Ok(InviteCode::new(&startup.id, code))
            }
            Err(e) => {
                warn!(
                    target: "invites.regenerate_failed",
                    error = %e,
                    "Failed to regenerate invite code"
                );
                Err(e.into())
            }
        }
    }

    /// Members of the startup in server order.
    #[instrument(skip_all, fields(startup_id = %startup.id))]
    pub async fn list_members(&self, session: &Session, startup: &Startup) -> Result<Vec<Member>> {
        Ok(self
            .api
            .list_members(&session.access_token, &startup.id)
            .await?)
    }

    /// Remove `member` from the startup.
    ///
    /// Founders are refused before any request is sent.
    #[instrument(skip_all, fields(startup_id = %startup.id, member = %member.user_id))]
    pub async fn remove_member(
        &self,
        session: &Session,
        startup: &Startup,
        member: &Member,
    ) -> Result<()> {
        require_founder(startup)?;
        if member.role == StartupRole::Founder {
            return Err(TenantError::CannotRemoveFounder);
        }

        self.api
            .remove_member(&session.access_token, &startup.id, &member.user_id)
            .await
            .map_err(|e| {
                warn!(
                    target: "invites.remove_failed",
                    error = %e,
                    "Failed to remove member"
                );
                TenantError::from(e)
            })?;

        info!("Member removed");
        Ok(())
    }
}

impl std::fmt::Debug for InviteManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InviteManager")
            .field("displayed", &self.displayed().slots.len())
            .finish()
    }
}

fn require_team_manager(startup: &Startup) -> Result<()> {
    if startup.user_role.permissions().can_manage_team {
        Ok(())
    } else {
        Err(TenantError::insufficient_permission("can_manage_team"))
    }
}

fn require_founder(startup: &Startup) -> Result<()> {
    require_team_manager(startup)?;
    if startup.user_role.is_founder() {
        Ok(())
    } else {
        Err(TenantError::insufficient_permission("founder"))
    }
}
