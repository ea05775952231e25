use std::sync::Arc;
use tenantry::auth::AuthState;
use tenantry::invites::{REGENERATE_FAILED, REMOVE_FAILED};
use tenantry::tenants::{Industry, Member, NewStartup, Stage};
use tenantry::testing::{InMemoryWorkspaceApi, StaticIdentityProvider};
use tenantry::{AppContext, Startup, StartupRole, TenantError};

struct Workspace {
    api: InMemoryWorkspaceApi,
    app: AppContext,
}

async fn signed_in(user_id: &str, startups: &[Startup]) -> Workspace {
    let api = InMemoryWorkspaceApi::new();
    let session = api.sign_in(user_id, &format!("{}@example.com", user_id));
    for startup in startups {
        api.add_startup(user_id, startup.clone());
    }

    let app = AppContext::builder(Arc::new(StaticIdentityProvider::signed_in(session)))
        .with_workspace_api(Arc::new(api.clone()))
        .build();
    app.auth.start().await;
    app.auth.wait_until_settled().await;
    Workspace { api, app }
}

#[tokio::test]
async fn test_onboarding_rejects_blank_name() {
    let ws = signed_in("ada", &[]).await;

    let err = ws
        .app
        .auth
        .create_startup(NewStartup::named(""))
        .await
        .unwrap_err();

    assert_eq!(err.user_message("Failed to create startup"), "Startup name is required");
    assert_eq!(ws.api.calls("POST /startups"), 0);
    assert!(ws.app.auth.snapshot().startups.is_empty());
}

#[tokio::test]
async fn test_onboarding_creates_and_selects_first_startup() {
    let ws = signed_in("ada", &[]).await;
    let before = ws.app.auth.snapshot();
    assert_eq!(before.state, AuthState::Ready);
    assert!(before.tenants_loaded);
    assert!(before.current_startup.is_none());

    let input = NewStartup::named("  Acme  ")
        .description("Rockets")
        .industry(Industry::Saas)
        .stage(Stage::Mvp)
        .website("https://acme.example.com");
    let created = ws.app.auth.create_startup(input).await.unwrap();

    assert_eq!(created.name, "Acme");
    assert_eq!(created.user_role, StartupRole::Founder);

    let snapshot = ws.app.auth.snapshot();
    assert_eq!(snapshot.startups.len(), 1);
    assert_eq!(snapshot.current_startup.as_ref(), Some(&snapshot.startups[0]));
    assert!(snapshot.permissions.can_manage_team);
}

#[tokio::test]
async fn test_additional_startup_keeps_current_selection() {
    let ws = signed_in("ada", &[Startup::new("s1", "First", StartupRole::Member)]).await;

    let created = ws
        .app
        .auth
        .create_startup(NewStartup::named("Second"))
        .await
        .unwrap();

    let snapshot = ws.app.auth.snapshot();
    assert_eq!(snapshot.startups.len(), 2);
    assert_eq!(snapshot.current_startup.unwrap().id, "s1");

    ws.app.auth.select_startup(&created.id).unwrap();
    assert!(ws.app.auth.snapshot().permissions.can_manage_startup);
}

#[tokio::test]
async fn test_invite_code_lifecycle() {
    let ws = signed_in("ada", &[Startup::new("s1", "Acme", StartupRole::Founder)]).await;
    let snapshot = ws.app.auth.snapshot();
    let session = snapshot.session.clone().unwrap();
    let startup = snapshot.current_startup.clone().unwrap();
    let invites = &ws.app.invites;

    let first = invites.get_or_create_code(&session, &startup).await.unwrap().unwrap();
    let again = invites.get_or_create_code(&session, &startup).await.unwrap().unwrap();
    assert_eq!(first, again);

    let rotated = invites.regenerate(&session, &startup).await.unwrap();
    let rotated_again = invites.regenerate(&session, &startup).await.unwrap();
    assert_ne!(first.code, rotated.code);
    assert_ne!(rotated.code, rotated_again.code);
    assert!(!ws.api.is_code_valid("s1", &rotated.code));
    assert!(ws.api.is_code_valid("s1", &rotated_again.code));
    assert_eq!(invites.displayed_code("s1"), Some(rotated_again.clone()));

    let fetched = invites.get_or_create_code(&session, &startup).await.unwrap().unwrap();
    assert_eq!(fetched, rotated_again);
}

#[tokio::test]
async fn test_team_management_as_founder() {
    let ws = signed_in("ada", &[Startup::new("s1", "Acme", StartupRole::Founder)]).await;
    let snapshot = ws.app.auth.snapshot();
    let session = snapshot.session.clone().unwrap();
    let startup = snapshot.current_startup.clone().unwrap();
    ws.api.add_member(
        "s1",
        Member {
            id: "m_bob".to_string(),
            user_id: "bob".to_string(),
            full_name: Some("Bob Stone".to_string()),
            email: Some("bob@example.com".to_string()),
            role: StartupRole::Manager,
        },
    );

    let members = ws.app.invites.list_members(&session, &startup).await.unwrap();
    assert_eq!(members.len(), 2);

    let removable: Vec<_> = members
        .iter()
        .filter(|m| tenantry::InviteManager::can_remove(&startup, m))
        .map(|m| m.user_id.as_str())
        .collect();
    assert_eq!(removable, vec!["bob"]);

    let founder = members.iter().find(|m| m.user_id == "ada").unwrap();
    assert!(matches!(
        ws.app.invites.remove_member(&session, &startup, founder).await,
        Err(TenantError::CannotRemoveFounder)
    ));

    let bob = members.iter().find(|m| m.user_id == "bob").unwrap();
    ws.app.invites.remove_member(&session, &startup, bob).await.unwrap();
    assert_eq!(ws.api.member_ids("s1"), vec!["ada".to_string()]);

    // Removing again surfaces the backend's detail
    let err = ws
        .app
        .invites
        .remove_member(&session, &startup, bob)
        .await
        .unwrap_err();
    assert_eq!(err.user_message(REMOVE_FAILED), "Member not found");
}

#[tokio::test]
async fn test_manager_cannot_rotate_or_remove() {
    let ws = signed_in("ada", &[Startup::new("s1", "Acme", StartupRole::Manager)]).await;
    let snapshot = ws.app.auth.snapshot();
    let session = snapshot.session.clone().unwrap();
    let startup = snapshot.current_startup.clone().unwrap();
    assert!(!snapshot.permissions.can_manage_team);

    let err = ws.app.invites.regenerate(&session, &startup).await.unwrap_err();
    assert!(matches!(err, TenantError::InsufficientPermission { .. }));
    assert_ne!(err.user_message(REGENERATE_FAILED), "");
    assert_eq!(ws.api.calls("POST /startups/s1/regenerate-invite"), 0);
}
