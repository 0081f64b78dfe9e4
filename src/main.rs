use clap::{Parser, Subcommand, ValueEnum};
use miette::{IntoDiagnostic, Result};
use quizpay::application::auth::AuthService;
use quizpay::application::payment::{PaymentFlow, ResultLoad, SubmitOutcome};
use quizpay::application::poller::{PaidSnapshot, PollOutcome, PollReport, ReconciliationPoller};
use quizpay::application::quiz::QuizSession;
use quizpay::config::{Config, ConfigArgs};
use quizpay::domain::attempt::{Answer, AttemptId, QuizResult};
use quizpay::domain::payment::{PaymentTarget, ProviderOutcome, RedirectStatus};
use quizpay::domain::ports::KeyValueStoreRef;
use quizpay::domain::session::{AuthEvent, AuthEvents, Credentials, GoogleCredential, UserId};
use quizpay::domain::storage::Storage;
use quizpay::error::ClientError;
use quizpay::infrastructure::file::JsonFileStore;
use quizpay::infrastructure::http::HttpBackend;
use quizpay::infrastructure::provider::ReportedProvider;
use quizpay::interfaces::csv::answer_reader::AnswerReader;
use quizpay::interfaces::csv::history_writer::HistoryWriter;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

const SYNC_FLUSH_LIMIT: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create an account and sign in
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        name: Option<String>,
    },
    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Sign in with a Google id token (native) or access token (web)
    Google {
        #[arg(long, conflicts_with = "access_token", required_unless_present = "access_token")]
        id_token: Option<String>,
        #[arg(long)]
        access_token: Option<String>,
    },
    /// Clear the local session
    Logout {
        /// Keep in-progress quiz answers
        #[arg(long)]
        preserve_quiz: bool,
    },
    /// Show the signed-in user, refreshed from the backend
    Whoami,
    /// Delete the account on the backend and clear the local session
    DeleteAccount,
    /// List quiz questions
    Questions,
    /// Record an answer to the in-progress quiz
    Answer {
        #[arg(long)]
        question_id: u32,
        #[arg(long)]
        value: i32,
    },
    /// Submit the in-progress quiz, or answers from a CSV file
    Submit {
        /// CSV file with `question_id,value` rows
        #[arg(long)]
        answers: Option<PathBuf>,
    },
    /// Show the result of an attempt
    Result {
        attempt: String,
        /// The provider already reported the payment as confirmed
        #[arg(long)]
        expect_payment: bool,
    },
    /// Print quiz history as CSV
    History,
    /// Pay for an attempt or a premium upgrade and wait for the backend to confirm
    Pay {
        #[arg(long, conflicts_with = "user", required_unless_present = "user")]
        attempt: Option<String>,
        #[arg(long)]
        user: Option<String>,
        /// Outcome reported by the payment provider
        #[arg(long, value_enum)]
        outcome: OutcomeArg,
        /// Provider transaction id; derived from the client secret when omitted
        #[arg(long)]
        payment_intent: Option<String>,
        /// Provider error message (with --outcome failed)
        #[arg(long)]
        message: Option<String>,
    },
    /// Resume confirmation of the pending payment after returning from the provider
    Resume {
        #[arg(long, default_value = "succeeded")]
        redirect_status: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutcomeArg {
    Succeeded,
    Failed,
    RequiresAction,
}

struct App {
    auth: Arc<AuthService>,
    quiz: QuizSession,
    payments: PaymentFlow,
}

fn open_store(config: &Config) -> Result<KeyValueStoreRef> {
    if let Some(db_path) = &config.db_path {
        #[cfg(feature = "storage-rocksdb")]
        {
            let store =
                quizpay::infrastructure::rocksdb::RocksDBStore::open(db_path).into_diagnostic()?;
            return Ok(Arc::new(store));
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        warn!(
            path = %db_path.display(),
            "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to JSON file storage."
        );
    }
    Ok(Arc::new(JsonFileStore::new(&config.store_path)))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).into_diagnostic()?);
    Ok(())
}

fn print_result(result: &QuizResult) -> Result<()> {
    if result.is_unlocked() {
        println!("Full result unlocked.");
    } else if let Some(name) = result.preview_type_name() {
        println!("Preview: {name} (locked)");
    }
    print_json(result)
}

fn print_report(report: &PollReport) -> Result<()> {
    match &report.outcome {
        PollOutcome::Confirmed(PaidSnapshot::Attempt(result)) => {
            println!("Payment confirmed after {} check(s).", report.ticks);
            print_result(result)
        }
        PollOutcome::Confirmed(PaidSnapshot::Account(user)) => {
            println!("Premium unlocked for {}.", user.email);
            Ok(())
        }
        PollOutcome::TimedOut { .. } => {
            println!(
                "Payment received but still processing. Run `quizpay resume` to check again."
            );
            if let Some(error) = &report.last_error {
                println!("Last error while checking: {error}");
            }
            Ok(())
        }
        PollOutcome::Cancelled => {
            println!("Stopped waiting for confirmation. Run `quizpay resume` to check again.");
            Ok(())
        }
    }
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });
    cancel
}

/// Applies the free quiz limit to signed-in users. Anonymous quizzes are not
/// limited since there is no history to check.
async fn ensure_can_start_quiz(app: &App) -> Result<()> {
    if !app.auth.is_logged_in().await.into_diagnostic()? {
        return Ok(());
    }
    let user = app.auth.refresh_profile().await.into_diagnostic()?;
    match app.quiz.ensure_can_start(&user).await {
        Err(ClientError::FreeQuizLimitReached) => Err(miette::miette!(
            help = format!(
                "Upgrade with `quizpay pay --user {} --outcome succeeded` for unlimited quizzes",
                user.id
            ),
            "{}",
            ClientError::FreeQuizLimitReached
        )),
        other => other.into_diagnostic(),
    }
}

async fn run(app: &mut App, command: Command) -> Result<()> {
    match command {
        Command::Register {
            email,
            password,
            name,
        } => {
            let user = app
                .auth
                .register(&Credentials {
                    email,
                    password,
                    name,
                })
                .await
                .into_diagnostic()?;
            println!("Registered and signed in as {}", user.email);
        }
        Command::Login { email, password } => {
            let user = app
                .auth
                .login(&Credentials {
                    email,
                    password,
                    name: None,
                })
                .await
                .into_diagnostic()?;
            println!("Signed in as {}", user.email);
        }
        Command::Google {
            id_token,
            access_token,
        } => {
            let credential = match (id_token, access_token) {
                (Some(token), _) => GoogleCredential::IdToken(token),
                (None, Some(token)) => GoogleCredential::AccessToken(token),
                (None, None) => miette::bail!("Either --id-token or --access-token is required"),
            };
            let user = app.auth.login_google(&credential).await.into_diagnostic()?;
            println!("Signed in as {}", user.email);
        }
        Command::Logout { preserve_quiz } => {
            app.auth.logout(preserve_quiz).await.into_diagnostic()?;
            app.quiz.observe(&AuthEvent::SignedOut);
            println!("Signed out");
        }
        Command::Whoami => {
            if !app.auth.is_logged_in().await.into_diagnostic()? {
                miette::bail!("Not signed in");
            }
            let user = app.auth.refresh_profile().await.into_diagnostic()?;
            print_json(&user)?;
        }
        Command::DeleteAccount => {
            app.auth.delete_account().await.into_diagnostic()?;
            println!("Account deleted");
        }
        Command::Questions => {
            let questions = app.quiz.questions().await.into_diagnostic()?;
            print_json(&questions)?;
        }
        Command::Answer { question_id, value } => {
            if app.quiz.answers().await.into_diagnostic()?.is_empty() {
                ensure_can_start_quiz(app).await?;
            }
            let questions = app.quiz.questions().await.into_diagnostic()?;
            match app
                .quiz
                .record_answer(&questions, Answer { question_id, value })
                .await
                .into_diagnostic()?
            {
                Some(next) => println!(
                    "Answer saved. Next question: {} of {}",
                    next + 1,
                    questions.len()
                ),
                None => {
                    println!("All questions answered. Run `quizpay submit` to see your result.")
                }
            }
        }
        Command::Submit { answers } => {
            let answers = match answers {
                Some(path) => {
                    let file = File::open(path).into_diagnostic()?;
                    let answers = AnswerReader::new(file)
                        .answers()
                        .collect::<quizpay::error::Result<Vec<_>>>()
                        .into_diagnostic()?;
                    Some(answers)
                }
                None => None,
            };
            ensure_can_start_quiz(app).await?;
            let result = match answers {
                Some(answers) => app.quiz.submit_answers(&answers).await,
                None => app.quiz.submit().await,
            }
            .into_diagnostic()?;
            print_result(&result)?;
        }
        Command::Result {
            attempt,
            expect_payment,
        } => {
            let attempt = AttemptId::new(attempt).into_diagnostic()?;
            let cancel = cancel_on_ctrl_c();
            match app
                .payments
                .load_result(&attempt, expect_payment, &cancel)
                .await
                .into_diagnostic()?
            {
                ResultLoad::Ready(result) => {
                    print_result(&result)?;
                    app.quiz.remember(result);
                }
                ResultLoad::Reconciled(report) => print_report(&report)?,
            }
        }
        Command::History => {
            let history = app.quiz.history().await.into_diagnostic()?;
            let stdout = io::stdout();
            HistoryWriter::new(stdout.lock())
                .write_history(&history)
                .into_diagnostic()?;
        }
        Command::Pay {
            attempt,
            user,
            outcome,
            payment_intent,
            message,
        } => {
            let target = match (attempt, user) {
                (Some(attempt), _) => {
                    PaymentTarget::Attempt(AttemptId::new(attempt).into_diagnostic()?)
                }
                (None, Some(user)) => PaymentTarget::Upgrade(UserId(user)),
                (None, None) => miette::bail!("Either --attempt or --user is required"),
            };
            let outcome = match outcome {
                OutcomeArg::Succeeded => ProviderOutcome::Succeeded {
                    payment_intent_id: payment_intent.unwrap_or_default(),
                },
                OutcomeArg::Failed => ProviderOutcome::Failed {
                    message: message.unwrap_or_else(|| "Payment failed".to_string()),
                },
                OutcomeArg::RequiresAction => ProviderOutcome::RequiresAction,
            };
            let provider = ReportedProvider::new(outcome);
            let cancel = cancel_on_ctrl_c();

            match app
                .payments
                .pay(&target, &provider, &cancel)
                .await
                .into_diagnostic()?
            {
                SubmitOutcome::Reconciled(report) => print_report(&report)?,
                SubmitOutcome::AwaitingProvider => println!(
                    "Payment requires additional action. \
                     Complete it with the provider, then run `quizpay resume`."
                ),
            }
        }
        Command::Resume { redirect_status } => {
            let status: RedirectStatus = redirect_status
                .parse()
                .map_err(|e: String| miette::miette!("{e}"))?;
            let cancel = cancel_on_ctrl_c();
            let report = app
                .payments
                .resume(status, &cancel)
                .await
                .into_diagnostic()?;
            print_report(&report)?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::try_from(cli.config).into_diagnostic()?;

    let storage = Storage::new(open_store(&config)?);
    let events = AuthEvents::new();
    let mut auth_events = events.subscribe();

    let backend = Arc::new(
        HttpBackend::new(&config.api_url, storage.clone(), events.clone()).into_diagnostic()?,
    );
    let poller = ReconciliationPoller::new(
        backend.clone(),
        backend.clone(),
        storage.clone(),
        config.poll,
    );

    let mut app = App {
        auth: Arc::new(AuthService::new(backend.clone(), storage.clone(), events)),
        quiz: QuizSession::new(backend.clone(), storage.clone()),
        payments: PaymentFlow::new(backend.clone(), backend, poller, storage),
    };

    let outcome = run(&mut app, cli.command).await;

    if !app.payments.flush_sync(SYNC_FLUSH_LIMIT).await {
        warn!("Payment sync still in flight at exit, the webhook will reconcile");
    }

    // A 401 anywhere during the command invalidates the cached session.
    while let Ok(event) = auth_events.try_recv() {
        if event == AuthEvent::SessionExpired {
            app.quiz.observe(&event);
            if let Err(e) = app.auth.logout(false).await {
                warn!(error = %e, "Failed to clear expired session");
            }
            eprintln!("Session expired, please sign in again.");
            break;
        }
    }

    outcome
}
