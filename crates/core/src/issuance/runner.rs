//! Token issuance workflow.
//!
//! Stages run strictly in order and fail fast:
//! validate -> wallet -> metadata -> deploy -> confirm deploy -> verify state -> mint.
//! Metadata confirmation overlaps with deployment key generation; mint
//! confirmations run concurrently once every mint has been submitted.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::collaborators::{
    parse_amount, ChainClient, CollaboratorError, Collaborators, DeployRequest, JobResult,
    MintTransactionRequest, Pinner, ProvingService, SignedTransaction, StateVerifier,
    TokenAddresses, TxStatus, UnsignedTransaction, WalletConnection,
};
use crate::config::{ChainConfig, MetadataConfig};
use crate::metrics;
use crate::poller::{wait_until, CancelToken, PollOutcome, PollSettings, WaitError};
use crate::timeline::{shorten, Description, TimelineItem, TimelineSink, TimelineUpdate};

use super::config::IssuanceConfig;
use super::types::{
    mint_memo, IssuanceError, IssueRequest, IssuerStatus, RunHandle, RunPhase, RunReport,
    TokenMetadata, VerifiedMint, MAX_SYMBOL_LEN,
};

/// Why a single step inside a stage failed.
#[derive(Debug)]
enum StepError {
    Cancelled,
    Failed(String),
}

impl StepError {
    fn description(&self) -> String {
        match self {
            StepError::Cancelled => "Cancelled".to_string(),
            StepError::Failed(reason) => reason.clone(),
        }
    }

    /// Description prefixed with `context` unless the step was cancelled.
    fn describe(&self, context: &str) -> String {
        match self {
            StepError::Cancelled => "Cancelled".to_string(),
            StepError::Failed(reason) => format!("{}: {}", context, reason),
        }
    }

    fn into_issuance(self, wrap: impl FnOnce(String) -> IssuanceError) -> IssuanceError {
        match self {
            StepError::Cancelled => IssuanceError::Cancelled,
            StepError::Failed(reason) => wrap(reason),
        }
    }
}

impl From<WaitError> for StepError {
    fn from(e: WaitError) -> Self {
        match e {
            WaitError::Cancelled => StepError::Cancelled,
            other => StepError::Failed(other.to_string()),
        }
    }
}

impl From<CollaboratorError> for StepError {
    fn from(e: CollaboratorError) -> Self {
        StepError::Failed(e.to_string())
    }
}

#[derive(Default)]
enum RunSlot {
    #[default]
    Idle,
    Running {
        run_id: String,
        cancel: CancelToken,
        phase: RunPhase,
    },
}

#[derive(Default)]
struct IssuerState {
    slot: RunSlot,
    last_run: Option<RunReport>,
    /// Run whose items the timeline currently shows. Outlives the slot
    /// until the next run clears the timeline.
    timeline_owner: Option<String>,
}

struct Shared {
    config: IssuanceConfig,
    chain: ChainConfig,
    metadata: MetadataConfig,
    collaborators: Collaborators,
    timeline: Arc<dyn TimelineSink>,
    state: Mutex<IssuerState>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, IssuerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Return the slot to `Idle` if `run_id` still holds it.
    fn release(&self, run_id: &str) {
        let mut state = self.lock();
        if matches!(&state.slot, RunSlot::Running { run_id: id, .. } if id == run_id) {
            state.slot = RunSlot::Idle;
        }
    }
}

/// Releases the run slot even if the run task panics or is aborted.
///
/// Also sets the run's cancel flag, so background work spawned by the run
/// stops at its next poll.
struct RunGuard {
    shared: Arc<Shared>,
    run_id: String,
    cancel: CancelToken,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.shared.release(&self.run_id);
    }
}

/// Timeline writer for tasks that may outlive their run.
///
/// Writes are dropped once another run has taken over the timeline.
struct RunTimeline {
    shared: Arc<Shared>,
    run_id: String,
}

impl RunTimeline {
    fn write(&self, apply: impl FnOnce(&dyn TimelineSink)) {
        let state = self.shared.lock();
        if state.timeline_owner.as_deref() == Some(self.run_id.as_str()) {
            apply(self.shared.timeline.as_ref());
        } else {
            debug!(run_id = %self.run_id, "Dropping timeline write from a finished run");
        }
    }
}

impl TimelineSink for RunTimeline {
    fn clear(&self) {
        self.write(|sink| sink.clear());
    }

    fn append(&self, item: TimelineItem) {
        self.write(|sink| sink.append(item));
    }

    fn update_by_id(&self, id: &str, update: TimelineUpdate) {
        self.write(|sink| sink.update_by_id(id, update));
    }

    fn set_current(&self, item: Option<TimelineItem>) {
        self.write(|sink| sink.set_current(item));
    }
}

/// Per-run state. Owned by one run, never shared across runs.
struct RunContext {
    run_id: String,
    cancel: CancelToken,
    started_at: DateTime<Utc>,
    started: Instant,
    token_address: Option<String>,
    admin_contract_address: Option<String>,
    minted: usize,
    _guard: RunGuard,
}

/// Drives token issuance runs, one at a time.
#[derive(Clone)]
pub struct TokenIssuer {
    shared: Arc<Shared>,
}

impl TokenIssuer {
    pub fn new(
        config: IssuanceConfig,
        chain: ChainConfig,
        metadata: MetadataConfig,
        collaborators: Collaborators,
        timeline: Arc<dyn TimelineSink>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                chain,
                metadata,
                collaborators,
                timeline,
                state: Mutex::new(IssuerState::default()),
            }),
        }
    }

    /// Start a run in the background.
    ///
    /// Fails with [`IssuanceError::AlreadyRunning`] while another run holds
    /// the issuer. Progress is observable through the timeline.
    pub fn issue_token(&self, request: IssueRequest) -> Result<RunHandle, IssuanceError> {
        let ctx = self.begin()?;
        let run_id = ctx.run_id.clone();
        let issuer = self.clone();
        let join = tokio::spawn(async move { issuer.execute(ctx, request).await });
        Ok(RunHandle::new(run_id, join))
    }

    /// Run to completion on the current task.
    pub async fn run(&self, request: IssueRequest) -> Result<RunReport, IssuanceError> {
        let ctx = self.begin()?;
        Ok(self.execute(ctx, request).await)
    }

    /// Cancel the active run. Returns `false` when idle or already cancelled.
    pub fn cancel(&self) -> bool {
        let state = self.shared.lock();
        match &state.slot {
            RunSlot::Running { run_id, cancel, .. } => {
                let first = cancel.cancel();
                if first {
                    info!(run_id = %run_id, "Issuance cancellation requested");
                }
                first
            }
            RunSlot::Idle => false,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.shared.lock().slot, RunSlot::Running { .. })
    }

    pub fn status(&self) -> IssuerStatus {
        let state = self.shared.lock();
        match &state.slot {
            RunSlot::Running { run_id, phase, .. } => IssuerStatus {
                running: true,
                run_id: Some(run_id.clone()),
                phase: *phase,
                last_run: state.last_run.clone(),
            },
            RunSlot::Idle => IssuerStatus {
                running: false,
                run_id: None,
                phase: match &state.last_run {
                    Some(report) if report.issued => RunPhase::Done,
                    Some(_) => RunPhase::Error,
                    None => RunPhase::Idle,
                },
                last_run: state.last_run.clone(),
            },
        }
    }

    fn begin(&self) -> Result<RunContext, IssuanceError> {
        let run_id = Uuid::new_v4().to_string();
        let cancel = CancelToken::new();
        {
            let mut state = self.shared.lock();
            if matches!(state.slot, RunSlot::Running { .. }) {
                warn!("Issuance already running");
                return Err(IssuanceError::AlreadyRunning);
            }
            state.slot = RunSlot::Running {
                run_id: run_id.clone(),
                cancel: cancel.clone(),
                phase: RunPhase::Validating,
            };
            state.timeline_owner = Some(run_id.clone());
            // Under the lock so a previous run's late writes cannot land after it.
            self.shared.timeline.clear();
        }

        metrics::RUNS_STARTED.inc();

        Ok(RunContext {
            run_id: run_id.clone(),
            cancel: cancel.clone(),
            started_at: Utc::now(),
            started: Instant::now(),
            token_address: None,
            admin_contract_address: None,
            minted: 0,
            _guard: RunGuard {
                shared: Arc::clone(&self.shared),
                run_id,
                cancel,
            },
        })
    }

    async fn execute(&self, mut ctx: RunContext, request: IssueRequest) -> RunReport {
        let span = info_span!("issuance", run_id = %ctx.run_id);
        async move {
            info!(symbol = %request.symbol.trim(), mints = request.mint.len(), "Starting token issuance");
            let result = self.stages(&mut ctx, &request).await;
            self.finish(ctx, result)
        }
        .instrument(span)
        .await
    }

    fn finish(&self, ctx: RunContext, result: Result<(), IssuanceError>) -> RunReport {
        self.shared.timeline.set_current(None);

        let label = match &result {
            Ok(()) => {
                info!(minted = ctx.minted, "Token issued");
                "issued"
            }
            Err(IssuanceError::Cancelled) => {
                warn!("Issuance cancelled");
                "cancelled"
            }
            Err(e) => {
                error!(stage = e.stage(), "Issuance failed: {}", e);
                metrics::STAGE_FAILURES.with_label_values(&[e.stage()]).inc();
                "failed"
            }
        };
        if result.is_err() {
            // Stops anything still polling on behalf of this run.
            ctx.cancel.cancel();
        }

        metrics::RUNS_FINISHED.with_label_values(&[label]).inc();
        metrics::RUN_DURATION
            .with_label_values(&[label])
            .observe(ctx.started.elapsed().as_secs_f64());

        let report = RunReport {
            run_id: ctx.run_id.clone(),
            issued: result.is_ok(),
            error: result.err().map(|e| e.to_string()),
            token_address: ctx.token_address.clone(),
            admin_contract_address: ctx.admin_contract_address.clone(),
            minted: ctx.minted,
            started_at: ctx.started_at,
            finished_at: Utc::now(),
        };

        {
            let mut state = self.shared.lock();
            state.last_run = Some(report.clone());
            if matches!(&state.slot, RunSlot::Running { run_id, .. } if *run_id == ctx.run_id) {
                state.slot = RunSlot::Idle;
            }
        }

        report
    }

    async fn stages(
        &self,
        ctx: &mut RunContext,
        request: &IssueRequest,
    ) -> Result<(), IssuanceError> {
        self.enter(ctx, RunPhase::Validating)?;
        let (symbol, mints) = self.validate(request).await?;

        self.enter(ctx, RunPhase::ConnectingWallet)?;
        let admin_address = self.connect_wallet().await?;

        self.enter(ctx, RunPhase::PublishingMetadata)?;
        let confirmation = self.publish_metadata(ctx, request).await?;

        self.enter(ctx, RunPhase::Deploying)?;
        let (addresses, hash) = self
            .deploy(ctx, &symbol, &admin_address, confirmation)
            .await?;

        self.enter(ctx, RunPhase::ConfirmingDeploy)?;
        self.confirm_deploy(ctx, &hash).await?;

        self.enter(ctx, RunPhase::VerifyingState)?;
        self.verify_state(ctx, &addresses).await?;

        if !mints.is_empty() {
            self.enter(ctx, RunPhase::Minting)?;
            self.mint_all(ctx, &symbol, &addresses, &mints).await?;
        }

        Ok(())
    }

    /// Cancellation checkpoint before each stage.
    fn enter(&self, ctx: &RunContext, phase: RunPhase) -> Result<(), IssuanceError> {
        if ctx.cancel.is_cancelled() {
            let timeline = &self.shared.timeline;
            timeline.set_current(None);
            timeline.append(TimelineItem::error(
                "cancelled",
                "Token issuance cancelled",
                "Cancelled",
            ));
            return Err(IssuanceError::Cancelled);
        }

        let mut state = self.shared.lock();
        if let RunSlot::Running {
            run_id,
            phase: current,
            ..
        } = &mut state.slot
        {
            if *run_id == ctx.run_id {
                *current = phase;
            }
        }
        drop(state);

        info!(phase = phase.as_str(), "Entering stage");
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Stage 1: input validation
    // ---------------------------------------------------------------------

    async fn validate(
        &self,
        request: &IssueRequest,
    ) -> Result<(String, Vec<VerifiedMint>), IssuanceError> {
        let timeline = &self.shared.timeline;
        timeline.set_current(Some(TimelineItem::current(
            "Issuing token",
            "Checking data...",
        )));

        let symbol = match request.checked_symbol() {
            Some(symbol) => symbol.to_string(),
            None => {
                let reason = format!(
                    "Token symbol must be 1 to {} characters long",
                    MAX_SYMBOL_LEN
                );
                timeline.set_current(None);
                timeline.append(TimelineItem::error(
                    "symbol",
                    "Wrong token symbol",
                    reason.clone(),
                ));
                return Err(IssuanceError::Validation(reason));
            }
        };

        let mut mints = Vec::new();
        for entry in request.mint.iter().filter(|m| !m.is_empty()) {
            let amount = entry.amount.trim();
            let to = entry.to.trim();
            let valid = self
                .shared
                .collaborators
                .validator
                .is_valid_mint_entry(amount, to)
                .await;

            match parse_amount(amount).filter(|_| valid) {
                Some(units) => mints.push(VerifiedMint {
                    index: mints.len(),
                    amount: units,
                    to: to.to_string(),
                }),
                None => {
                    let reason = format!(
                        "Cannot mint {} {} tokens to {} because of wrong amount or address",
                        amount, symbol, to
                    );
                    timeline.set_current(None);
                    timeline.append(TimelineItem::error("mint", "Wrong mint data", reason.clone()));
                    return Err(IssuanceError::Validation(reason));
                }
            }
        }

        timeline.set_current(None);
        debug!(mints = mints.len(), "Input validated");
        Ok((symbol, mints))
    }

    // ---------------------------------------------------------------------
    // Stage 2: wallet
    // ---------------------------------------------------------------------

    async fn connect_wallet(&self) -> Result<String, IssuanceError> {
        let timeline = &self.shared.timeline;
        timeline.append(TimelineItem::waiting(
            "wallet",
            "Connecting to wallet",
            "Connecting to wallet...",
        ));

        let outcome = match self.shared.collaborators.wallet.connect().await {
            Ok(connection) => self.check_wallet(connection),
            Err(e) => Err(e.to_string()),
        };

        match outcome {
            Ok(address) => {
                info!(address = %address, "Wallet connected");
                timeline.update_by_id(
                    "wallet",
                    TimelineUpdate::success(
                        "Connected to wallet",
                        Description::new()
                            .text("Account: ")
                            .link(shorten(&address), self.shared.chain.account_url(&address)),
                    ),
                );
                Ok(address)
            }
            Err(reason) => {
                timeline.update_by_id(
                    "wallet",
                    TimelineUpdate::error("Failed to connect to wallet", reason.clone()),
                );
                Err(IssuanceError::Connection(reason))
            }
        }
    }

    fn check_wallet(&self, connection: WalletConnection) -> Result<String, String> {
        if !connection.success {
            return Err(connection
                .error
                .unwrap_or_else(|| "Install the wallet to continue".to_string()));
        }

        let address = connection
            .address
            .filter(|a| !a.is_empty())
            .ok_or_else(|| "Wallet returned no account".to_string())?;

        if let Some(network) = connection.network.as_deref() {
            let expected = self.shared.chain.network.as_str();
            if !network.to_ascii_lowercase().contains(expected) {
                return Err(format!(
                    "Wallet is connected to {}, switch it to {}",
                    network, expected
                ));
            }
        }

        Ok(address)
    }

    // ---------------------------------------------------------------------
    // Stage 3: metadata
    // ---------------------------------------------------------------------

    /// Pin the metadata record and start confirming it in the background.
    async fn publish_metadata(
        &self,
        ctx: &RunContext,
        request: &IssueRequest,
    ) -> Result<JoinHandle<Result<String, StepError>>, IssuanceError> {
        let shared = &self.shared;
        let timeline = &shared.timeline;
        timeline.append(TimelineItem::waiting(
            "metadata",
            "Publishing token metadata",
            "Saving token metadata to permanent storage...",
        ));

        let metadata = TokenMetadata::new(request, &shared.metadata);
        let published = match serde_json::to_string(&metadata) {
            Ok(content) => match shared.collaborators.pinner.publish(&content).await {
                Ok(Some(hash)) => Ok(hash),
                Ok(None) => Err("Pinning service returned no hash".to_string()),
                Err(e) => Err(e.to_string()),
            },
            Err(e) => Err(format!("Failed to serialize metadata: {}", e)),
        };

        let hash = match published {
            Ok(hash) => hash,
            Err(reason) => {
                timeline.update_by_id(
                    "metadata",
                    TimelineUpdate::error("Failed to publish token metadata", reason.clone()),
                );
                return Err(IssuanceError::Publish(reason));
            }
        };

        info!(hash = %hash, "Metadata published");
        timeline.update_by_id(
            "metadata",
            TimelineUpdate::success(
                "Token metadata published",
                Description::new()
                    .text("Metadata hash: ")
                    .text(shorten(&hash)),
            ),
        );
        timeline.append(TimelineItem::waiting(
            "metadata-confirm",
            "Confirming token metadata",
            "Waiting for the metadata to be included into permanent storage...",
        ));

        Ok(tokio::spawn(
            confirm_metadata(
                Arc::clone(&shared.collaborators.pinner),
                Arc::new(RunTimeline {
                    shared: Arc::clone(shared),
                    run_id: ctx.run_id.clone(),
                }),
                shared.config.pin,
                ctx.cancel.clone(),
                hash,
            )
            .in_current_span(),
        ))
    }

    // ---------------------------------------------------------------------
    // Stage 4: deployment
    // ---------------------------------------------------------------------

    async fn deploy(
        &self,
        ctx: &mut RunContext,
        symbol: &str,
        admin_address: &str,
        confirmation: JoinHandle<Result<String, StepError>>,
    ) -> Result<(TokenAddresses, String), IssuanceError> {
        let shared = &self.shared;
        let timeline = &shared.timeline;
        timeline.set_current(Some(TimelineItem::current(
            "Deploying token contract",
            "Generating deployment keys...",
        )));

        let keys = match shared.collaborators.builder.generate_deploy_keys().await {
            Ok(keys) => keys,
            Err(e) => {
                let reason = e.to_string();
                // The confirmation task observes the flag and settles.
                ctx.cancel.cancel();
                let _ = confirmation.await;
                timeline.set_current(None);
                timeline.append(TimelineItem::error(
                    "deploy",
                    "Deploying token contract failed",
                    reason.clone(),
                ));
                return Err(IssuanceError::Deploy(reason));
            }
        };

        ctx.token_address = Some(keys.token_address.clone());
        ctx.admin_contract_address = Some(keys.admin_contract_address.clone());
        info!(
            token = %keys.token_address,
            admin_contract = %keys.admin_contract_address,
            "Deployment keys generated"
        );

        timeline.set_current(Some(TimelineItem::current(
            "Deploying token contract",
            "Waiting for token metadata confirmation...",
        )));
        let uri = match confirmation.await {
            Ok(Ok(uri)) => uri,
            Ok(Err(failure)) => {
                timeline.set_current(None);
                return Err(failure.into_issuance(IssuanceError::Publish));
            }
            Err(e) => {
                let reason = format!("Metadata confirmation task failed: {}", e);
                timeline.set_current(None);
                timeline.update_by_id(
                    "metadata-confirm",
                    TimelineUpdate::error("Failed to confirm token metadata", reason.clone()),
                );
                return Err(IssuanceError::Publish(reason));
            }
        };
        timeline.set_current(None);

        let addresses = TokenAddresses {
            token_contract_address: keys.token_address.clone(),
            admin_contract_address: keys.admin_contract_address.clone(),
            admin_address: admin_address.to_string(),
        };

        timeline.append(TimelineItem::waiting(
            "deploy",
            "Deploying token contract",
            "Building deployment transaction...",
        ));
        let request = DeployRequest {
            keys,
            admin_address: admin_address.to_string(),
            symbol: symbol.to_string(),
            uri,
        };
        let sent = match shared.collaborators.builder.build_deploy(&request).await {
            Ok(tx) => self.prove_and_submit(&ctx.cancel, "deploy", tx).await,
            Err(e) => Err(StepError::from(e)),
        };

        match sent {
            Ok(hash) => {
                info!(hash = %hash, "Deployment transaction sent");
                timeline.update_by_id(
                    "deploy",
                    TimelineUpdate::success(
                        "Deployment transaction sent",
                        Description::new()
                            .text("Transaction ")
                            .link(shorten(&hash), shared.chain.tx_url(&hash))
                            .text(" sent to the network"),
                    ),
                );
                Ok((addresses, hash))
            }
            Err(failure) => {
                timeline.update_by_id(
                    "deploy",
                    TimelineUpdate::error("Deploying token contract failed", failure.description()),
                );
                Err(failure.into_issuance(IssuanceError::Deploy))
            }
        }
    }

    /// Prove locally or through the cloud job service, then broadcast.
    async fn prove_and_submit(
        &self,
        cancel: &CancelToken,
        item_id: &str,
        tx: UnsignedTransaction,
    ) -> Result<String, StepError> {
        let shared = &self.shared;
        let collaborators = &shared.collaborators;
        let timeline = &shared.timeline;

        let signed = if shared.config.cloud_proving {
            let job_id = collaborators
                .prover
                .submit(&tx)
                .await?
                .filter(|id| !id.is_empty())
                .ok_or_else(|| StepError::Failed("Proving service returned no job id".to_string()))?;
            debug!(job_id = %job_id, "Proving job submitted");
            timeline.update_by_id(
                item_id,
                TimelineUpdate::waiting(format!("Proving transaction, job {}...", shorten(&job_id))),
            );
            wait_until("job", shared.config.job, cancel, || {
                job_outcome(collaborators.prover.as_ref(), &job_id)
            })
            .await?
        } else {
            timeline.update_by_id(item_id, TimelineUpdate::waiting("Proving transaction..."));
            collaborators.builder.prove(&tx).await?
        };

        if cancel.is_cancelled() {
            return Err(StepError::Cancelled);
        }

        timeline.update_by_id(item_id, TimelineUpdate::waiting("Sending transaction..."));
        Ok(collaborators.chain.send_transaction(&signed).await?)
    }

    // ---------------------------------------------------------------------
    // Stage 5: deployment confirmation
    // ---------------------------------------------------------------------

    async fn confirm_deploy(&self, ctx: &RunContext, hash: &str) -> Result<(), IssuanceError> {
        let shared = &self.shared;
        let timeline = &shared.timeline;
        timeline.append(TimelineItem::waiting(
            "deploy-confirm",
            "Waiting for the token contract deployment",
            self.inclusion_note(hash),
        ));

        let result = wait_until("deploy_tx", shared.config.deploy_tx, &ctx.cancel, || {
            tx_outcome(shared.collaborators.chain.as_ref(), hash)
        })
        .await;

        match result {
            Ok(()) => {
                info!(hash = %hash, "Deployment applied");
                timeline.update_by_id(
                    "deploy-confirm",
                    TimelineUpdate::success(
                        "Token contract deployed",
                        Description::new()
                            .text("Successfully deployed the token contract with transaction hash ")
                            .link(shorten(hash), shared.chain.tx_url(hash))
                            .text("."),
                    ),
                );
                Ok(())
            }
            Err(e) => {
                let failure = StepError::from(e);
                timeline.update_by_id(
                    "deploy-confirm",
                    TimelineUpdate::error(
                        "Token contract deployment failed",
                        failure.describe("Failed to deploy token contract"),
                    ),
                );
                Err(failure.into_issuance(IssuanceError::ChainConfirmation))
            }
        }
    }

    // ---------------------------------------------------------------------
    // Stage 6: contract state
    // ---------------------------------------------------------------------

    async fn verify_state(
        &self,
        ctx: &RunContext,
        addresses: &TokenAddresses,
    ) -> Result<(), IssuanceError> {
        let shared = &self.shared;
        let timeline = &shared.timeline;
        timeline.append(TimelineItem::waiting(
            "verify-state",
            "Verifying the token contract state",
            "Verifying the token contract state...",
        ));

        let result = wait_until("state", shared.config.state, &ctx.cancel, || {
            state_outcome(shared.collaborators.verifier.as_ref(), addresses)
        })
        .await;

        match result {
            Ok(()) => {
                let token = &addresses.token_contract_address;
                let admin = &addresses.admin_contract_address;
                timeline.update_by_id(
                    "verify-state",
                    TimelineUpdate::success(
                        "Token contract state verified",
                        Description::new()
                            .text("Token contract ")
                            .link(shorten(token), shared.chain.account_url(token))
                            .text(" is linked to admin contract ")
                            .link(shorten(admin), shared.chain.account_url(admin)),
                    ),
                );
                Ok(())
            }
            Err(e) => {
                let failure = StepError::from(e);
                timeline.update_by_id(
                    "verify-state",
                    TimelineUpdate::error(
                        "Failed to verify token contract state",
                        failure.describe("Failed to verify token contract state"),
                    ),
                );
                Err(failure.into_issuance(IssuanceError::StateVerification))
            }
        }
    }

    // ---------------------------------------------------------------------
    // Stage 7: minting
    // ---------------------------------------------------------------------

    async fn mint_all(
        &self,
        ctx: &mut RunContext,
        symbol: &str,
        addresses: &TokenAddresses,
        mints: &[VerifiedMint],
    ) -> Result<(), IssuanceError> {
        let shared = &self.shared;
        let timeline = &shared.timeline;
        let cancel = ctx.cancel.clone();

        timeline.set_current(Some(TimelineItem::current(
            "Minting tokens",
            format!(
                "Preparing data to mint {} tokens to {} addresses",
                symbol,
                mints.len()
            ),
        )));

        // Fetched once; the sequence is advanced locally for every submission.
        let first_nonce = match shared
            .collaborators
            .chain
            .account_nonce(&addresses.admin_address)
            .await
        {
            Ok(nonce) => nonce,
            Err(e) => {
                let reason = format!("Failed to fetch account nonce: {}", e);
                timeline.set_current(None);
                timeline.append(TimelineItem::error("mint", "Failed to mint tokens", reason.clone()));
                return Err(IssuanceError::Mint { index: 0, reason });
            }
        };
        debug!(nonce = first_nonce, count = mints.len(), "Reserved nonce sequence");

        let mut submitted: Vec<(&VerifiedMint, String)> = Vec::with_capacity(mints.len());
        let mut submit_failure: Option<(usize, StepError)> = None;

        for (offset, mint) in mints.iter().enumerate() {
            if offset > 0 && !self.pause_between_mints(&cancel).await {
                submit_failure = Some((mint.index, StepError::Cancelled));
                break;
            }
            if cancel.is_cancelled() {
                submit_failure = Some((mint.index, StepError::Cancelled));
                break;
            }

            let id = mint_item_id(mint.index);
            timeline.append(TimelineItem::waiting(
                id.as_str(),
                format!(
                    "Minting {} {} to {}",
                    mint.display_amount(),
                    symbol,
                    shorten(&mint.to)
                ),
                "Building transaction...",
            ));

            let request = MintTransactionRequest {
                token_address: addresses.token_contract_address.clone(),
                admin_contract_address: addresses.admin_contract_address.clone(),
                admin_address: addresses.admin_address.clone(),
                to: mint.to.clone(),
                amount: mint.amount,
                nonce: first_nonce + offset as u64,
                memo: mint_memo(mint.amount, symbol),
                sequence: offset,
            };
            let sent = match shared.collaborators.builder.build_mint(&request).await {
                Ok(tx) => self.prove_and_submit(&cancel, &id, tx).await,
                Err(e) => Err(StepError::from(e)),
            };

            match sent {
                Ok(hash) => {
                    metrics::MINTS_SUBMITTED.inc();
                    info!(index = mint.index, nonce = request.nonce, hash = %hash, "Mint transaction sent");
                    timeline.update_by_id(&id, TimelineUpdate::waiting(self.inclusion_note(&hash)));
                    submitted.push((mint, hash));
                }
                Err(failure) => {
                    warn!(index = mint.index, "Mint submission failed: {}", failure.description());
                    timeline.update_by_id(
                        &id,
                        TimelineUpdate::error("Failed to mint tokens", failure.description()),
                    );
                    submit_failure = Some((mint.index, failure));
                    break;
                }
            }
        }

        if !submitted.is_empty() {
            timeline.set_current(Some(TimelineItem::current(
                "Minting tokens",
                "Waiting for mint transactions to be included into a block",
            )));
        }

        // Every submitted mint is waited on, even after a sibling failed.
        let results = join_all(
            submitted
                .iter()
                .map(|(mint, hash)| self.confirm_mint(&cancel, mint, hash)),
        )
        .await;
        timeline.set_current(None);

        let mut failures = Vec::new();
        for ((mint, _), result) in submitted.iter().zip(results) {
            match result {
                Ok(()) => ctx.minted += 1,
                Err(failure) => failures.push((mint.index, failure)),
            }
        }
        failures.extend(submit_failure);

        if let Some((index, failure)) = failures.into_iter().next() {
            let description = match &failure {
                StepError::Cancelled => "Cancelled".to_string(),
                StepError::Failed(_) => {
                    format!("Minted to {} of {} addresses", ctx.minted, mints.len())
                }
            };
            timeline.append(TimelineItem::error("mint", "Failed to mint tokens", description));
            return Err(failure.into_issuance(|reason| IssuanceError::Mint { index, reason }));
        }

        timeline.append(TimelineItem::success(
            "mint",
            format!("Tokens are minted to {} addresses", mints.len()),
            "All mint transactions are included into a block",
        ));
        Ok(())
    }

    /// Sleep between submissions. Returns `false` if cancelled meanwhile.
    async fn pause_between_mints(&self, cancel: &CancelToken) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(self.shared.config.mint_submit_delay()) => true,
            _ = cancel.cancelled() => false,
        }
    }

    async fn confirm_mint(
        &self,
        cancel: &CancelToken,
        mint: &VerifiedMint,
        hash: &str,
    ) -> Result<(), StepError> {
        let shared = &self.shared;
        let id = mint_item_id(mint.index);

        let result = wait_until("mint_tx", shared.config.mint_tx, cancel, || {
            tx_outcome(shared.collaborators.chain.as_ref(), hash)
        })
        .await;

        match result {
            Ok(()) => {
                shared.timeline.update_by_id(
                    &id,
                    TimelineUpdate::status(crate::timeline::TimelineStatus::Success)
                        .with_description(
                            Description::new()
                                .text("Successfully minted the token with transaction hash ")
                                .link(shorten(hash), shared.chain.tx_url(hash))
                                .text("."),
                        ),
                );
                Ok(())
            }
            Err(e) => {
                let failure = StepError::from(e);
                warn!(index = mint.index, hash = %hash, "Mint not confirmed: {}", failure.description());
                shared.timeline.update_by_id(
                    &id,
                    TimelineUpdate::error("Failed to mint tokens", failure.description()),
                );
                Err(failure)
            }
        }
    }

    fn inclusion_note(&self, hash: &str) -> Description {
        Description::new()
            .text("It can take a few minutes for the transaction with hash ")
            .link(shorten(hash), self.shared.chain.tx_url(hash))
            .text(" to be included into the block.")
    }
}

fn mint_item_id(index: usize) -> String {
    format!("mint-{}", index)
}

async fn confirm_metadata(
    pinner: Arc<dyn Pinner>,
    timeline: Arc<dyn TimelineSink>,
    settings: PollSettings,
    cancel: CancelToken,
    hash: String,
) -> Result<String, StepError> {
    let result = wait_until("pin", settings, &cancel, || {
        pin_outcome(pinner.as_ref(), &hash)
    })
    .await;

    match result {
        Ok(url) => {
            info!(hash = %hash, "Metadata confirmed");
            timeline.update_by_id(
                "metadata-confirm",
                TimelineUpdate::success(
                    "Token metadata confirmed",
                    Description::new()
                        .text("Metadata is available at ")
                        .link(shorten(&hash), url.clone()),
                ),
            );
            Ok(url)
        }
        Err(e) => {
            let failure = StepError::from(e);
            timeline.update_by_id(
                "metadata-confirm",
                TimelineUpdate::error("Failed to confirm token metadata", failure.description()),
            );
            Err(failure)
        }
    }
}

// Poll predicates

async fn pin_outcome(
    pinner: &dyn Pinner,
    hash: &str,
) -> Result<PollOutcome<String>, CollaboratorError> {
    let status = pinner.status(hash).await?;
    if !status.success {
        return Err(CollaboratorError::InvalidResponse(
            "pin status unavailable".to_string(),
        ));
    }
    if status.is_confirmed() {
        Ok(PollOutcome::Confirmed(
            status.url.unwrap_or_else(|| hash.to_string()),
        ))
    } else {
        Ok(PollOutcome::Pending)
    }
}

async fn tx_outcome(
    chain: &dyn ChainClient,
    hash: &str,
) -> Result<PollOutcome<()>, CollaboratorError> {
    match chain.tx_status(hash).await? {
        Some(TxStatus::Applied) => Ok(PollOutcome::Confirmed(())),
        Some(TxStatus::Pending) => Ok(PollOutcome::Pending),
        Some(TxStatus::Failed(kind)) => Ok(PollOutcome::PermanentFailure(format!(
            "transaction failed: {}",
            kind
        ))),
        None => Err(CollaboratorError::InvalidResponse(format!(
            "no status for transaction {}",
            hash
        ))),
    }
}

async fn job_outcome(
    prover: &dyn ProvingService,
    job_id: &str,
) -> Result<PollOutcome<SignedTransaction>, CollaboratorError> {
    match prover.result(job_id).await? {
        Some(JobResult::Completed(tx)) => Ok(PollOutcome::Confirmed(tx)),
        Some(JobResult::Failed(reason)) => Ok(PollOutcome::PermanentFailure(reason)),
        None => Ok(PollOutcome::Pending),
    }
}

async fn state_outcome(
    verifier: &dyn StateVerifier,
    addresses: &TokenAddresses,
) -> Result<PollOutcome<()>, CollaboratorError> {
    if verifier.verify(addresses).await? {
        Ok(PollOutcome::Confirmed(()))
    } else {
        Ok(PollOutcome::Pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[test]
    fn test_step_error_from_wait_error() {
        assert!(matches!(
            StepError::from(WaitError::Cancelled),
            StepError::Cancelled
        ));
        let failure = StepError::from(WaitError::TimedOut { attempts: 3 });
        assert_eq!(failure.description(), "not confirmed after 3 attempts");
        assert_eq!(
            failure.describe("Failed to deploy token contract"),
            "Failed to deploy token contract: not confirmed after 3 attempts"
        );
    }

    #[test]
    fn test_step_error_into_issuance() {
        let err = StepError::Cancelled.into_issuance(IssuanceError::Deploy);
        assert_eq!(err, IssuanceError::Cancelled);

        let err = StepError::Failed("boom".to_string()).into_issuance(IssuanceError::Deploy);
        assert_eq!(err, IssuanceError::Deploy("boom".to_string()));
    }

    #[test]
    fn test_mint_item_id() {
        assert_eq!(mint_item_id(0), "mint-0");
        assert_eq!(mint_item_id(12), "mint-12");
    }

    #[tokio::test]
    async fn test_status_idle_before_any_run() {
        let harness = fixtures::harness();
        let status = harness.issuer.status();
        assert!(!status.running);
        assert_eq!(status.phase, RunPhase::Idle);
        assert!(!harness.issuer.cancel());
    }

    #[tokio::test]
    async fn test_guard_released_after_run() {
        let harness = fixtures::harness();
        let report = harness.issuer.run(fixtures::request()).await.unwrap();
        assert!(report.issued);
        assert!(!harness.issuer.is_running());

        let status = harness.issuer.status();
        assert_eq!(status.phase, RunPhase::Done);
        assert_eq!(status.last_run.unwrap().run_id, report.run_id);
    }

    #[tokio::test]
    async fn test_guard_released_when_handle_aborted() {
        let harness = fixtures::harness();
        harness.chain.set_pending_forever(true).await;

        let handle = harness.issuer.issue_token(fixtures::request()).unwrap();
        assert!(harness.issuer.is_running());

        handle.abort();
        // Abort drops the task and with it the run guard.
        tokio::task::yield_now().await;
        for _ in 0..10 {
            if !harness.issuer.is_running() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(!harness.issuer.is_running());
    }
}
