//! Manager behaviour against fake collaborators.


use crate::{AuthError, AuthErrorKind, AuthOperation, ResumeTrigger, SessionPhase, SignUpParams};
use anyhow::anyhow;
use connectivity_monitor::{ConnectivityConfig, ConnectivityMonitor};
use harness::*;
use identity_client::{AuthEventKind, Credentials, OtpPurpose, SignUpResponse};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn credentials() -> Credentials {
    Credentials::new("user-1@example.com", "correct horse")
}

// --- GetToken ---

#[tokio::test]
async fn get_token_refreshes_when_expiring_soon() {
    let h = Harness::new("/");
    h.signed_in_with(session_expiring_in(30, "old"));
    h.identity.script_refresh(Ok(session_expiring_in(3600, "fresh")));

    assert_eq!(h.manager.get_token().await.as_deref(), Some("fresh"));
    assert_eq!(h.manager.current_session().unwrap().access_token, "fresh");
}

#[tokio::test]
async fn get_token_skips_refresh_when_far_from_expiry() {
    let h = Harness::new("/");
    h.signed_in_with(session_expiring_in(3600, "current"));

    assert_eq!(h.manager.get_token().await.as_deref(), Some("current"));
    assert_eq!(h.identity.count("refresh_session"), 0);
}

#[tokio::test]
async fn get_token_keeps_valid_token_when_refresh_fails() {
    let h = Harness::new("/profile");
    h.signed_in_with(session_expiring_in(30, "original"));
    h.identity.script_refresh(Err(rejected(500, "unavailable")));

    assert_eq!(h.manager.get_token().await.as_deref(), Some("original"));
    assert!(h.manager.is_authenticated());
    assert_eq!(h.identity.count("sign_out"), 0);
    assert!(h.navigator.navigations().is_empty());
}

#[tokio::test]
async fn get_token_logs_out_when_expired_and_refresh_fails() {
    let h = Harness::new("/");
    h.signed_in_with(session_expiring_in(-60, "stale"));
    h.identity.script_refresh(Err(rejected(400, "refresh token revoked")));

    assert_eq!(h.manager.get_token().await, None);
    assert!(!h.manager.is_authenticated());
    assert!(h.manager.current_session().is_none());
    assert_eq!(h.identity.count("sign_out"), 1);
}

#[tokio::test]
async fn get_token_without_session_is_none() {
    let h = Harness::new("/");
    assert_eq!(h.manager.get_token().await, None);
    assert!(h.identity.calls().is_empty());
}

// --- Login ---

#[tokio::test]
async fn login_commits_session() {
    let h = Harness::new("/login");
    h.identity.script_exchange(Ok(session_expiring_in(3600, "issued")));

    let outcome = h.manager.login(&credentials()).await.unwrap();

    assert_eq!(outcome.user.id, "user-1");
    assert_eq!(outcome.session.access_token, "issued");
    assert!(h.manager.is_authenticated());
    assert_eq!(h.manager.phase(), SessionPhase::Authenticated);
    assert_eq!(h.identity.calls(), vec!["exchange_password", "set_session"]);
}

#[tokio::test]
async fn login_hook_runs_before_session_is_committed() {
    let h = Harness::new("/login");
    h.identity.script_exchange(Ok(session_expiring_in(3600, "issued")));

    let session_absent_during_hook = Arc::new(AtomicBool::new(false));
    let observed = session_absent_during_hook.clone();
    let manager = h.manager.clone();
    let identity = h.identity.clone();

    h.manager
        .login_with_hook(&credentials(), move |user_id| {
            observed.store(manager.current_session().is_none(), Ordering::SeqCst);
            identity.record(format!("hook:{}", user_id));
            async { Ok(()) }
        })
        .await
        .unwrap();

    assert!(session_absent_during_hook.load(Ordering::SeqCst));
    assert_eq!(
        h.identity.calls(),
        vec!["exchange_password", "hook:user-1", "set_session"]
    );
    assert!(h.manager.current_session().is_some());
}

#[tokio::test]
async fn failing_login_hook_aborts_before_commit() {
    let h = Harness::new("/login");
    h.identity.script_exchange(Ok(session_expiring_in(3600, "issued")));

    let error = h
        .manager
        .login_with_hook(&credentials(), |_user_id| async {
            Err(anyhow!("profile bootstrap failed"))
        })
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        AuthError::OperationFailed {
            operation: AuthOperation::Login,
            ..
        }
    ));
    assert_eq!(h.identity.count("set_session"), 0);
    assert!(!h.manager.is_authenticated());
}

#[tokio::test]
async fn rejected_login_is_invalid_credentials() {
    let h = Harness::new("/login");
    h.identity
        .script_exchange(Err(rejected(400, "Invalid login credentials")));

    let error = h.manager.login(&credentials()).await.unwrap_err();
    assert_eq!(error.kind(), AuthErrorKind::InvalidCredentials);
    assert!(!h.manager.is_authenticated());
}

#[tokio::test]
async fn operations_without_identity_client_are_unavailable() {
    let manager = manager_without_identity();

    assert_eq!(
        manager.login(&credentials()).await.unwrap_err(),
        AuthError::ServiceUnavailable
    );
    assert_eq!(
        manager
            .verify_otp("a@b.c", "123456", OtpPurpose::Signup)
            .await
            .unwrap_err(),
        AuthError::ServiceUnavailable
    );
    assert_eq!(manager.get_token().await, None);
    manager.logout().await;
}

// --- SignUp ---

#[tokio::test]
async fn sign_up_rejects_bad_username_without_network() {
    let h = Harness::new("/signup");

    let error = h
        .manager
        .sign_up(&SignUpParams {
            email: "new@example.com".to_string(),
            password: "secret-password".to_string(),
            username: Some("ab".to_string()),
            captcha_token: None,
        })
        .await
        .unwrap_err();

    assert_eq!(error.kind(), AuthErrorKind::InvalidUsernameFormat);
    assert!(h.identity.calls().is_empty());
}

#[tokio::test]
async fn sign_up_pending_verification_stays_anonymous() {
    let h = Harness::new("/signup");
    h.identity.script_sign_up(Ok(SignUpResponse {
        user: user("user-2"),
        session: None,
    }));

    let outcome = h
        .manager
        .sign_up(&SignUpParams {
            email: "user-2@example.com".to_string(),
            password: "secret-password".to_string(),
            username: Some("valid_name".to_string()),
            captcha_token: Some("captcha".to_string()),
        })
        .await
        .unwrap();

    assert_eq!(outcome.user.id, "user-2");
    assert!(outcome.session.is_none());
    assert!(!h.manager.is_authenticated());
}

// --- VerifyOtp ---

#[tokio::test]
async fn verify_otp_applies_session() {
    let h = Harness::new("/verify");
    h.identity.script_verify(Ok(session_expiring_in(3600, "verified")));

    let outcome = h
        .manager
        .verify_otp("user-1@example.com", "123456", OtpPurpose::Signup)
        .await
        .unwrap();

    assert_eq!(outcome.session.access_token, "verified");
    assert!(h.manager.is_authenticated());
}

#[tokio::test]
async fn rejected_code_is_verification_failure() {
    let h = Harness::new("/verify");
    h.identity.script_verify(Err(rejected(403, "Token has expired")));

    let error = h
        .manager
        .verify_otp("user-1@example.com", "000000", OtpPurpose::Signup)
        .await
        .unwrap_err();
    assert_eq!(error.kind(), AuthErrorKind::VerificationFailed);
}

#[tokio::test]
async fn verify_with_callback_defers_events_until_applied() {
    let h = Harness::new("/verify");
    h.identity.script_verify(Ok(session_expiring_in(3600, "verified")));

    let seen_during_hook = Arc::new(Mutex::new(None));
    let recorded = seen_during_hook.clone();
    let manager = h.manager.clone();

    h.manager
        .verify_otp_with_callback(
            "user-1@example.com",
            "123456",
            OtpPurpose::Signup,
            move |user_id| {
                // The identity client already emitted SIGNED_IN; it was ignored.
                *recorded.lock().unwrap() = Some((
                    user_id,
                    manager.is_deferring_updates(),
                    manager.is_authenticated(),
                ));
                async { Ok(()) }
            },
        )
        .await
        .unwrap();

    assert_eq!(
        seen_during_hook.lock().unwrap().clone(),
        Some(("user-1".to_string(), true, false))
    );
    assert!(!h.manager.is_deferring_updates());
    assert!(h.manager.is_authenticated());
}

#[tokio::test]
async fn verify_with_callback_hook_failure_leaves_state_unchanged() {
    let h = Harness::new("/verify");
    h.identity.script_verify(Ok(session_expiring_in(3600, "verified")));

    let error = h
        .manager
        .verify_otp_with_callback(
            "user-1@example.com",
            "123456",
            OtpPurpose::Signup,
            |_user_id| async { Err(anyhow!("could not create profile")) },
        )
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        AuthError::OperationFailed {
            operation: AuthOperation::VerifyOtp,
            ..
        }
    ));
    assert!(!h.manager.is_deferring_updates());
    assert!(h.manager.current_user().is_none());
    assert!(h.manager.current_session().is_none());
}

#[tokio::test]
async fn verify_with_callback_verification_failure_clears_deferral() {
    let h = Harness::new("/verify");
    h.identity.script_verify(Err(rejected(400, "invalid code")));

    let error = h
        .manager
        .verify_otp_with_callback("a@b.c", "000000", OtpPurpose::Signup, |_| async {
            Ok(())
        })
        .await
        .unwrap_err();

    assert_eq!(error.kind(), AuthErrorKind::VerificationFailed);
    assert!(!h.manager.is_deferring_updates());
}

async fn exploding_hook(_user_id: String) -> anyhow::Result<()> {
    panic!("hook exploded");
}

#[tokio::test]
async fn verify_with_callback_hook_panic_clears_deferral() {
    let h = Harness::new("/verify");
    h.identity.script_verify(Ok(session_expiring_in(3600, "verified")));

    let manager = h.manager.clone();
    let joined = tokio::spawn(async move {
        manager
            .verify_otp_with_callback("a@b.c", "123456", OtpPurpose::Signup, exploding_hook)
            .await
    })
    .await;

    assert!(joined.unwrap_err().is_panic());
    assert!(!h.manager.is_deferring_updates());
    assert!(!h.manager.is_authenticated());

    // Events flow again once the window closed.
    h.identity
        .emit(AuthEventKind::SignedIn, Some(session_expiring_in(3600, "later")));
    assert!(h.manager.is_authenticated());
}

// --- Logout and redirects ---

#[tokio::test]
async fn logout_on_protected_route_goes_home() {
    let h = Harness::new("/profile");
    h.signed_in_with(session_expiring_in(3600, "token"));

    h.manager.logout().await;

    assert!(!h.manager.is_authenticated());
    assert_eq!(h.navigator.navigations(), vec!["/"]);
}

#[tokio::test]
async fn logout_navigates_once_when_router_lags() {
    let navigator = FakeNavigator::lagging_at("/profile");
    let h = Harness::with_navigator(navigator.clone());
    h.signed_in_with(session_expiring_in(3600, "token"));

    h.manager.logout().await;

    assert!(!h.manager.is_authenticated());
    assert!(!h.manager.is_deferring_updates());
    assert_eq!(h.identity.count("sign_out"), 1);
    assert_eq!(navigator.navigations(), vec!["/"]);
}

#[tokio::test]
async fn logout_on_public_route_stays() {
    let h = Harness::new("/about");
    h.signed_in_with(session_expiring_in(3600, "token"));

    h.manager.logout().await;

    assert!(!h.manager.is_authenticated());
    assert!(h.navigator.navigations().is_empty());
}

#[tokio::test]
async fn logout_clears_local_state_when_remote_fails() {
    let h = Harness::new("/settings/account");
    h.signed_in_with(session_expiring_in(3600, "token"));
    h.identity.fail_sign_out();

    h.manager.logout().await;

    assert!(h.manager.current_session().is_none());
    assert_eq!(h.navigator.navigations(), vec!["/"]);
}

#[tokio::test]
async fn signed_out_event_on_protected_route_redirects() {
    let h = Harness::new("/notifications");
    h.signed_in_with(session_expiring_in(3600, "token"));

    h.identity.emit(AuthEventKind::SignedOut, None);

    assert!(!h.manager.is_authenticated());
    assert_eq!(h.navigator.navigations(), vec!["/"]);
}

// --- Password recovery ---

#[tokio::test(start_paused = true)]
async fn recovery_event_navigates_after_delay() {
    let h = Harness::new("/");

    h.identity.emit(
        AuthEventKind::PasswordRecovery,
        Some(session_expiring_in(3600, "recovery")),
    );
    assert!(h.manager.is_password_recovery());
    assert!(h.manager.is_authenticated());

    tokio::time::advance(Duration::from_millis(99)).await;
    settle().await;
    assert!(h.navigator.navigations().is_empty());

    tokio::time::advance(Duration::from_millis(1)).await;
    settle().await;
    assert_eq!(h.navigator.navigations(), vec!["/profile/password"]);
}

#[tokio::test(start_paused = true)]
async fn recovery_persists_until_password_updated() {
    let h = Harness::new("/");
    h.identity.emit(
        AuthEventKind::PasswordRecovery,
        Some(session_expiring_in(3600, "recovery")),
    );

    // Interim sign-in while recovering.
    h.identity
        .emit(AuthEventKind::SignedIn, Some(session_expiring_in(3600, "interim")));
    assert_eq!(h.manager.phase(), SessionPhase::PasswordRecoveryPending);

    h.manager.update_password("a new password").await.unwrap();

    assert_eq!(h.manager.phase(), SessionPhase::Authenticated);
    assert!(!h.manager.is_password_recovery());
    assert!(h.manager.is_authenticated());
}

#[tokio::test]
async fn update_password_requires_session() {
    let h = Harness::new("/");
    assert_eq!(
        h.manager.update_password("whatever").await.unwrap_err(),
        AuthError::NotAuthenticated
    );
    assert!(h.identity.calls().is_empty());
}

#[tokio::test]
async fn password_reset_uses_configured_redirect() {
    let h = Harness::new("/");
    h.manager
        .request_password_reset("user-1@example.com")
        .await
        .unwrap();
    h.manager
        .resend_otp("user-1@example.com", OtpPurpose::Signup)
        .await
        .unwrap();

    assert_eq!(
        h.identity.calls(),
        vec!["reset_password:<none>", "resend:signup"]
    );
}

// --- Validation and resume ---

#[tokio::test]
async fn validate_session_without_session_is_false() {
    let h = Harness::new("/");
    assert!(!h.manager.validate_session().await);
    assert!(h.identity.calls().is_empty());
}

#[tokio::test]
async fn validate_session_confirms_with_refresh() {
    let h = Harness::new("/");
    h.signed_in_with(session_expiring_in(3600, "token"));
    h.identity.script_refresh(Ok(session_expiring_in(3600, "confirmed")));

    assert!(h.manager.validate_session().await);
    assert_eq!(h.manager.current_session().unwrap().access_token, "confirmed");
}

#[tokio::test]
async fn validate_session_failure_logs_out() {
    let h = Harness::new("/profile");
    h.signed_in_with(session_expiring_in(3600, "token"));
    h.identity.script_refresh(Err(rejected(401, "session revoked")));

    assert!(!h.manager.validate_session().await);
    assert!(!h.manager.is_authenticated());
    assert_eq!(h.navigator.navigations(), vec!["/"]);
}

#[tokio::test]
async fn resume_without_session_does_nothing() {
    let h = Harness::new("/");
    h.manager
        .refresh_on_resume(ResumeTrigger::VisibilityVisible)
        .await;
    assert!(h.identity.calls().is_empty());
}

#[tokio::test]
async fn every_resume_signal_refreshes() {
    let h = Harness::new("/");
    h.signed_in_with(session_expiring_in(3600, "token"));
    for n in 0..3 {
        h.identity
            .script_refresh(Ok(session_expiring_in(3600, &format!("fresh-{}", n))));
    }

    for trigger in [
        ResumeTrigger::VisibilityVisible,
        ResumeTrigger::WindowFocus,
        ResumeTrigger::PageShowPersisted,
    ] {
        h.manager.refresh_on_resume(trigger).await;
    }

    assert_eq!(h.identity.count("refresh_session"), 3);
    assert!(h.manager.is_authenticated());
}

#[tokio::test]
async fn failed_resume_refresh_logs_out() {
    let h = Harness::new("/");
    h.signed_in_with(session_expiring_in(3600, "token"));
    h.identity.script_refresh(Err(rejected(400, "revoked")));

    h.manager.refresh_on_resume(ResumeTrigger::WindowFocus).await;

    assert!(!h.manager.is_authenticated());
    assert_eq!(h.identity.count("sign_out"), 1);
}

// --- Initialization ---

#[tokio::test]
async fn initialize_restores_valid_session() {
    let h = Harness::new("/");
    h.identity.store(session_expiring_in(3600, "persisted"));

    h.manager.initialize_session().await.unwrap();

    assert!(h.manager.is_authenticated());
    assert_eq!(h.identity.calls(), vec!["get_session"]);
}

#[tokio::test]
async fn initialize_refreshes_expired_session() {
    let h = Harness::new("/");
    h.identity.store(session_expiring_in(-10, "persisted"));
    h.identity.script_refresh(Ok(session_expiring_in(3600, "renewed")));

    h.manager.initialize_session().await.unwrap();

    assert_eq!(h.manager.current_session().unwrap().access_token, "renewed");
}

#[tokio::test]
async fn initialize_drops_unrefreshable_session() {
    let h = Harness::new("/");
    h.identity.store(session_expiring_in(-10, "persisted"));
    h.identity.script_refresh(Err(rejected(400, "revoked")));

    h.manager.initialize_session().await.unwrap();

    assert!(!h.manager.is_authenticated());
}

#[tokio::test]
async fn initialize_is_noop_when_server_rendering() {
    let h = Harness::server_rendering();
    h.identity.store(session_expiring_in(3600, "persisted"));

    h.manager.initialize_session().await.unwrap();

    assert!(!h.manager.is_authenticated());
    assert!(h.identity.calls().is_empty());
}

// --- Return URL and observers ---

#[tokio::test]
async fn return_url_is_consumed_once() {
    let h = Harness::new("/login");
    h.manager.set_return_url("/settings/billing");

    assert_eq!(
        h.manager.get_and_clear_return_url().as_deref(),
        Some("/settings/billing")
    );
    assert_eq!(h.manager.get_and_clear_return_url(), None);
}

#[tokio::test]
async fn observers_see_each_change_once() {
    let h = Harness::new("/");
    let snapshots = Arc::new(Mutex::new(Vec::new()));
    let recorded = snapshots.clone();
    let _subscription = h.manager.subscribe(move |snapshot| {
        recorded.lock().unwrap().push(snapshot.clone());
    });

    h.signed_in_with(session_expiring_in(3600, "token"));
    // Same user, new token: nothing observable changed.
    h.identity.emit(
        AuthEventKind::TokenRefreshed,
        Some(session_expiring_in(3600, "rotated")),
    );
    h.manager.logout().await;

    let snapshots = snapshots.lock().unwrap();
    assert_eq!(snapshots.len(), 2);
    assert!(snapshots[0].is_authenticated);
    assert_eq!(snapshots[0].user_id.as_deref(), Some("user-1"));
    assert!(!snapshots[1].is_authenticated);
}

// --- Connectivity coordination ---

fn idle_monitor() -> ConnectivityMonitor {
    ConnectivityMonitor::new(ConnectivityConfig::default(), Arc::new(AlwaysUp))
}

#[tokio::test]
async fn connectivity_changes_toggle_auto_refresh() {
    let monitor = idle_monitor();
    let h = Harness::with_connectivity("/", monitor.clone());

    monitor.on_os_offline();
    assert_eq!(h.identity.calls(), vec!["stop_auto_refresh"]);

    monitor.on_os_online();
    settle().await;
    assert_eq!(
        h.identity.calls(),
        vec!["stop_auto_refresh", "start_auto_refresh"]
    );

    monitor.stop();
}

#[tokio::test]
async fn offline_get_token_uses_current_token_without_refresh() {
    let monitor = idle_monitor();
    let h = Harness::with_connectivity("/", monitor.clone());
    h.signed_in_with(session_expiring_in(30, "cached"));
    monitor.on_os_offline();

    assert_eq!(h.manager.get_token().await.as_deref(), Some("cached"));
    assert_eq!(h.identity.count("refresh_session"), 0);
    monitor.stop();
}

#[tokio::test]
async fn offline_expired_token_is_withheld_without_logout() {
    let monitor = idle_monitor();
    let h = Harness::with_connectivity("/profile", monitor.clone());
    h.signed_in_with(session_expiring_in(-60, "stale"));
    monitor.on_os_offline();

    assert_eq!(h.manager.get_token().await, None);
    assert!(h.manager.is_authenticated());
    assert_eq!(h.identity.count("sign_out"), 0);
    monitor.stop();
}

#[tokio::test]
async fn offline_resume_and_validation_skip_the_network() {
    let monitor = idle_monitor();
    let h = Harness::with_connectivity("/", monitor.clone());
    h.signed_in_with(session_expiring_in(3600, "token"));
    monitor.on_os_offline();

    h.manager.refresh_on_resume(ResumeTrigger::WindowFocus).await;
    assert!(h.manager.validate_session().await);

    assert_eq!(h.identity.count("refresh_session"), 0);
    assert!(h.manager.is_authenticated());
    monitor.stop();
}
