mod common;

use std::time::Duration;

use roomboard::auth::{LoginForm, SignupForm};
use roomboard::routes::Resolution;
use roomboard::startup::{render_dashboard, sign_in, Credentials};
use tokio::time::timeout;

use common::build_state;

fn ada() -> Credentials {
    Credentials {
        email: "ada@example.com".to_string(),
        password: "secret".to_string(),
    }
}

#[tokio::test]
async fn signed_out_visitor_is_sent_to_login() {
    let state = build_state();
    state.session.subscribe();
    let session = state.session.initialize().await;

    assert!(!session.loading);
    assert!(!session.is_authenticated());
    assert_eq!(
        state.routes.resolve("/dashboard", &session),
        Resolution::Redirect("/login".to_string())
    );

    let output = render_dashboard(&state).await;
    assert_eq!(output["resolution"]["outcome"], "redirect");
    assert_eq!(output["resolution"]["path"], "/login");

    state.session.teardown();
}

#[tokio::test]
async fn login_admits_and_loads_the_dashboard() {
    let state = build_state();
    state.session.subscribe();
    state.session.initialize().await;

    sign_in(&state, &ada()).await.expect("sign-in should succeed");
    let session = state.session.snapshot();
    assert!(session.is_authenticated());

    assert_eq!(
        state.routes.resolve("/login", &session),
        Resolution::Redirect("/dashboard".to_string())
    );
    assert_eq!(
        state.routes.resolve("/nowhere", &session),
        Resolution::Redirect("/dashboard".to_string())
    );

    let output = render_dashboard(&state).await;
    let dashboard = &output["dashboard"];
    assert_eq!(dashboard["profile"]["user_id"], "u-ada");
    assert_eq!(dashboard["stats"]["room_bookings"], 2);
    assert_eq!(dashboard["stats"]["active_polls"], 1);
    assert_eq!(dashboard["stats"]["votes"], 1);

    let activities = dashboard["recent_activities"]
        .as_array()
        .expect("activities should be a list");
    assert_eq!(activities.len(), 2);
    assert_eq!(activities[0]["description"], "Voted in poll 1");
    assert!(output["greeting"].as_str().unwrap().starts_with("Good"));

    let profile = state.users.get_profile("auth-ada").await.unwrap();
    assert!(profile.last_login.is_some());

    state.session.teardown();
}

#[tokio::test]
async fn logout_is_observed_by_the_session_store() {
    let state = build_state();
    state.session.subscribe();
    state.session.initialize().await;
    sign_in(&state, &ada()).await.unwrap();

    state.gateway.logout().await.unwrap();
    let mut watch = state.session.watch();
    timeout(Duration::from_secs(2), watch.wait_for(|s| s.identity.is_none()))
        .await
        .expect("sign-out should reach the session store")
        .unwrap();

    assert_eq!(
        state.routes.resolve("/room-finder", &state.session.snapshot()),
        Resolution::Redirect("/login".to_string())
    );
    state.session.teardown();
}

#[tokio::test]
async fn registration_creates_profile_and_default_role() {
    let state = build_state();
    let form = SignupForm {
        first_name: "Grace".to_string(),
        last_name: "Hopper".to_string(),
        email: "grace@example.com".to_string(),
        password: "cobol".to_string(),
        confirm_password: "cobol".to_string(),
        agree_to_terms: true,
    };

    let registration = state.gateway.register(&form).await.unwrap();
    let profile = registration.profile.expect("users row should be created");
    assert_eq!(profile.full_name.as_deref(), Some("Grace Hopper"));
    assert!(state.users.has_role(&profile.user_id, "student").await);

    let identity = state
        .gateway
        .login(&LoginForm {
            email: "grace@example.com".to_string(),
            password: "cobol".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(identity.id, registration.identity.id);
}

#[tokio::test]
async fn rejected_credentials_leave_the_session_signed_out() {
    let state = build_state();
    state.session.subscribe();
    state.session.initialize().await;

    let wrong = Credentials {
        email: "ada@example.com".to_string(),
        password: "nope".to_string(),
    };
    let err = sign_in(&state, &wrong).await.unwrap_err();
    assert_eq!(err.to_string(), "Invalid login credentials");
    assert!(!state.session.snapshot().is_authenticated());
    state.session.teardown();
}
