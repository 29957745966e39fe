use std::{sync::Arc, time::Duration};

use reqwest::{Client, Url};
use tokio::{
    sync::{oneshot, watch},
    task::JoinHandle,
};

use crate::{
    Res,
    api::{CallbackOutcome, CallbackState},
    error::Error,
    management::TokenManager,
    server,
    spotify::auth::{self, needs_refresh, now},
    types::Credential,
};

/// Extra time allowed for the code exchange after the callback window.
const EXCHANGE_GRACE: Duration = Duration::from_secs(30);
const LISTENER_SHUTDOWN_WAIT: Duration = Duration::from_secs(5);

/// Where the interactive grant currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowState {
    Idle,
    AwaitingCallback,
    CodeReceived,
    Complete,
    Failed(FlowFailure),
}

impl FlowState {
    pub fn is_in_flight(&self) -> bool {
        matches!(self, FlowState::AwaitingCallback | FlowState::CodeReceived)
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, FlowState::Complete | FlowState::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowFailure {
    TimedOut(u64),
    Denied(String),
    Listener(String),
    Exchange(String),
}

impl From<FlowFailure> for Error {
    fn from(failure: FlowFailure) -> Self {
        match failure {
            FlowFailure::TimedOut(secs) => Error::AuthorizationTimeout(secs),
            FlowFailure::Denied(reason) => Error::Authorization(format!("denied by user: {reason}")),
            FlowFailure::Listener(reason) => Error::Authorization(reason),
            FlowFailure::Exchange(reason) => Error::Authorization(reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowStart {
    Started { authorize_url: Url },
    AlreadyInProgress,
}

/// Opens the authorization URL for the user. Returns false if it could not.
pub type BrowserOpener = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Secrets of one authorization attempt. Dropped when the attempt ends.
struct AuthAttempt {
    state: String,
    code_verifier: Option<String>,
}

impl AuthAttempt {
    fn new(pkce: bool) -> Self {
        Self {
            state: auth::generate_state(),
            code_verifier: pkce.then(auth::generate_code_verifier),
        }
    }

    fn code_challenge(&self) -> Option<String> {
        self.code_verifier.as_deref().map(auth::generate_code_challenge)
    }
}

/// Drives the browser-based grant. At most one attempt is in flight per
/// instance; share the instance to share that guarantee.
pub struct AuthorizationFlow {
    tokens: Arc<TokenManager>,
    http: Client,
    opener: BrowserOpener,
    state: Arc<watch::Sender<FlowState>>,
}

impl AuthorizationFlow {
    pub fn new(tokens: Arc<TokenManager>, http: Client) -> Self {
        let (state, _) = watch::channel(FlowState::Idle);
        Self {
            tokens,
            http,
            opener: Arc::new(|url| webbrowser::open(url).is_ok()),
            state: Arc::new(state),
        }
    }

    pub fn with_opener(mut self, opener: BrowserOpener) -> Self {
        self.opener = opener;
        self
    }

    pub fn state(&self) -> FlowState {
        self.state.borrow().clone()
    }

    pub fn in_progress(&self) -> bool {
        self.state.borrow().is_in_flight()
    }

    /// Starts an attempt unless one is already in flight.
    ///
    /// Returns once the listener is bound and the browser has been asked to
    /// open; the rest of the attempt runs on a background task.
    pub async fn start(&self) -> Res<FlowStart> {
        let Some(mut claim) = Claim::acquire(&self.state) else {
            tracing::debug!("authorization already in progress");
            return Ok(FlowStart::AlreadyInProgress);
        };

        let settings = self.tokens.settings();
        let attempt = AuthAttempt::new(settings.is_public_client());
        let challenge = attempt.code_challenge();
        let authorize_url = auth::build_authorize_url(settings, &attempt.state, challenge.as_deref());

        let listener = match server::bind(&settings.redirect_uri).await {
            Ok(listener) => listener,
            Err(e) => {
                claim.reason = e.to_string();
                return Err(e);
            }
        };

        let (code_tx, code_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let server = server::start_api_server(
            listener,
            settings.redirect_uri.path(),
            CallbackState::new(attempt.state.as_str(), code_tx),
            shutdown_rx,
        );

        if !(self.opener)(authorize_url.as_str()) {
            tracing::warn!(url = %authorize_url, "failed to open browser, open the URL manually");
        }
        tracing::info!(pkce = attempt.code_verifier.is_some(), "waiting for authorization callback");

        let pending = PendingAttempt {
            tokens: Arc::clone(&self.tokens),
            http: self.http.clone(),
            state: Arc::clone(&self.state),
            attempt,
            code_rx,
            shutdown_tx,
            server,
        };
        tokio::spawn(pending.run(settings.auth_timeout));
        claim.hand_off();

        Ok(FlowStart::Started { authorize_url })
    }

    /// Runs (or joins) an attempt and waits until it finishes.
    pub async fn authorize(&self) -> Res<Credential> {
        let rx = self.state.subscribe();
        self.start().await?;
        self.finished(rx).await
    }

    /// Waits for the attempt started by [`AuthorizationFlow::start`].
    pub async fn wait(&self) -> Res<Credential> {
        if matches!(*self.state.borrow(), FlowState::Idle) {
            return Err(Error::Authorization("no authorization attempt was started".into()));
        }
        self.finished(self.state.subscribe()).await
    }

    async fn finished(&self, mut rx: watch::Receiver<FlowState>) -> Res<Credential> {
        let bound = self.tokens.settings().auth_timeout + EXCHANGE_GRACE;
        let finished = tokio::time::timeout(bound, rx.wait_for(FlowState::is_finished))
            .await
            .map_err(|_| Error::AuthorizationTimeout(bound.as_secs()))?
            .map_err(|_| Error::Authorization("authorization flow was dropped".into()))?
            .clone();

        match finished {
            FlowState::Complete => self.tokens.current().await?.ok_or(Error::NotAuthenticated),
            FlowState::Failed(failure) => Err(failure.into()),
            other => Err(Error::Authorization(format!("unexpected flow state {other:?}"))),
        }
    }

    /// Makes sure a usable credential exists, running the grant if needed.
    ///
    /// A stored credential is usable if it can be refreshed or has not yet
    /// expired. An invalid credential file is reported, never overwritten.
    pub async fn ensure_credential(&self) -> Res<()> {
        if let Some(credential) = self.tokens.current().await? {
            if credential.has_refresh_token() || !needs_refresh(&credential, now()) {
                return Ok(());
            }
        }

        tracing::info!("no usable credential, starting authorization");
        self.authorize().await.map(|_| ())
    }
}

/// Marks the flow as in flight for the duration of `start`.
///
/// Unless handed off to the background task, dropping the claim moves the
/// flow to `Failed(Listener)`, which also covers a cancelled `start` future.
struct Claim<'a> {
    state: &'a watch::Sender<FlowState>,
    reason: String,
    armed: bool,
}

impl<'a> Claim<'a> {
    fn acquire(state: &'a watch::Sender<FlowState>) -> Option<Self> {
        let claimed = state.send_if_modified(|current| {
            if current.is_in_flight() {
                return false;
            }
            *current = FlowState::AwaitingCallback;
            true
        });
        claimed.then(|| Self {
            state,
            reason: "authorization start was cancelled".into(),
            armed: true,
        })
    }

    fn hand_off(mut self) {
        self.armed = false;
    }
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        if self.armed {
            let reason = std::mem::take(&mut self.reason);
            self.state
                .send_replace(FlowState::Failed(FlowFailure::Listener(reason)));
        }
    }
}

/// The background half of an attempt: wait, shut the listener, exchange.
struct PendingAttempt {
    tokens: Arc<TokenManager>,
    http: Client,
    state: Arc<watch::Sender<FlowState>>,
    attempt: AuthAttempt,
    code_rx: oneshot::Receiver<CallbackOutcome>,
    shutdown_tx: oneshot::Sender<()>,
    server: JoinHandle<()>,
}

impl PendingAttempt {
    async fn run(self, timeout: Duration) {
        let PendingAttempt {
            tokens,
            http,
            state,
            attempt,
            code_rx,
            shutdown_tx,
            mut server,
        } = self;

        let received = tokio::time::timeout(timeout, code_rx).await;

        let _ = shutdown_tx.send(());
        if tokio::time::timeout(LISTENER_SHUTDOWN_WAIT, &mut server).await.is_err() {
            tracing::warn!("callback listener did not shut down in time, aborting it");
            server.abort();
        }

        let code = match received {
            Ok(Ok(Ok(code))) => code,
            Ok(Ok(Err(denied))) => {
                state.send_replace(FlowState::Failed(FlowFailure::Denied(denied)));
                return;
            }
            Ok(Err(_)) => {
                state.send_replace(FlowState::Failed(FlowFailure::Listener(
                    "callback listener stopped before a code arrived".into(),
                )));
                return;
            }
            Err(_) => {
                tracing::warn!(secs = timeout.as_secs(), "authorization timed out");
                state.send_replace(FlowState::Failed(FlowFailure::TimedOut(timeout.as_secs())));
                return;
            }
        };

        state.send_replace(FlowState::CodeReceived);

        let exchanged = async {
            let credential = auth::exchange_code(
                &http,
                tokens.settings(),
                &code,
                attempt.code_verifier.as_deref(),
            )
            .await?;
            tokens.replace(credential).await
        }
        .await;

        match exchanged {
            Ok(()) => {
                tracing::info!("authorization complete, credential stored");
                state.send_replace(FlowState::Complete);
            }
            Err(e) => {
                tracing::warn!(error = %e, "authorization code exchange failed");
                state.send_replace(FlowState::Failed(FlowFailure::Exchange(e.to_string())));
            }
        }
    }
}
