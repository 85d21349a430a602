//! Enrollment flow.
//!
//! Connect, establish the secure session, send the request line, then
//! read until the manager closes the channel. A key is persisted the moment
//! it is classified; the run still waits for the close before finishing.

use agent_auth_core::{
    CredentialSink, EnrollmentRequest, ResponseClassifier, ResponseOutcome, READ_BUFFER_SIZE,
};

use crate::config::EnrollConfig;
use crate::connect::{connect, display_addr};
use crate::error::EnrollError;
use crate::session::SecureSession;

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollmentReport {
    /// Whether a key was received and persisted.
    pub credential_stored: bool,
    /// The terminal outcome that ended the exchange.
    pub outcome: ResponseOutcome,
}

/// Run one enrollment against the configured manager.
pub async fn run_enrollment<S>(
    config: &EnrollConfig,
    sink: &mut S,
) -> Result<EnrollmentReport, EnrollError>
where
    S: CredentialSink<Error = EnrollError>,
{
    let tcp = connect(&config.manager, config.port).await?;
    tracing::info!(addr = %display_addr(&config.manager, config.port), "Connected to manager");

    let expected_peer = config
        .tls
        .verifies_peer()
        .then_some(config.manager.as_str());
    let mut session =
        SecureSession::establish(tcp, &config.tls, &config.manager, expected_peer).await?;

    tracing::info!(agent_name = %config.request.identity(), "Using agent name");

    let result = exchange(&mut session, &config.request, sink).await;
    session.close().await;
    result
}

/// Send the request and classify replies until the exchange ends.
pub async fn exchange<S>(
    session: &mut SecureSession,
    request: &EnrollmentRequest,
    sink: &mut S,
) -> Result<EnrollmentReport, EnrollError>
where
    S: CredentialSink<Error = EnrollError>,
{
    session.send(request.to_line().as_bytes()).await?;
    tracing::info!("Request sent to manager. Waiting for reply.");

    let mut classifier = ResponseClassifier::new();
    let mut buf = [0u8; READ_BUFFER_SIZE];

    loop {
        let event = session.read_event(&mut buf).await;
        match classifier.classify(event) {
            ResponseOutcome::CredentialIssued(credential) => {
                sink.persist(credential)?;
                tracing::info!("Valid key created. Finished.");
            }
            ResponseOutcome::ServerError(message) => {
                tracing::warn!("{message} (from manager)");
            }
            ResponseOutcome::DuplicateCredential => {
                tracing::warn!("Ignoring additional key from manager");
            }
            ResponseOutcome::Ignored => {
                tracing::debug!("Ignoring unrecognized reply");
            }
            terminal => return finish(terminal, classifier.has_credential()),
        }
    }
}

fn finish(
    outcome: ResponseOutcome,
    credential_stored: bool,
) -> Result<EnrollmentReport, EnrollError> {
    match &outcome {
        ResponseOutcome::GracefulClose => {
            tracing::info!("Connection closed by manager (graceful shutdown)");
            if !credential_stored {
                tracing::warn!(
                    "Unable to create key. Either wrong password or connection not accepted by the manager."
                );
            }
        }
        ResponseOutcome::AbnormalClose {
            had_credential: true,
        } => {
            tracing::info!("Connection closed by manager (EOF after key creation)");
        }
        ResponseOutcome::ChannelFault {
            message,
            had_credential: true,
        } => {
            tracing::debug!(%message, "ignoring channel error after key creation");
        }
        _ => {}
    }

    if outcome.is_success() {
        return Ok(EnrollmentReport {
            credential_stored,
            outcome,
        });
    }

    Err(match outcome {
        ResponseOutcome::AbnormalClose { .. } => EnrollError::ClosedBeforeKey,
        ResponseOutcome::ProtocolViolation(e) => EnrollError::Protocol(e),
        ResponseOutcome::ReadFault(message) => EnrollError::Read(message),
        ResponseOutcome::ChannelFault { message, .. } => EnrollError::Channel(message),
        other => EnrollError::Channel(format!("exchange ended unexpectedly: {other:?}")),
    })
}
