//! Fetch → decode → match → compose → dispatch.
//!
//! One [`Pipeline::run`] owns all of its working data; nothing survives
//! between runs.

use std::sync::Arc;

use tracing::info;

use tender_core::row::{decode_tenders, decode_users};
use tender_core::{MatchEngine, MatchGroup, SchemaError};
use tender_notify::{Composer, DispatchReport, Dispatcher, NotifyError};
use tender_sheets::{Authorizer, SheetSource, SheetsError};

/// Errors that abort a pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("spreadsheet access failed: {0}")]
    Sheets(#[from] SheetsError),

    #[error("malformed sheet: {0}")]
    Schema(#[from] SchemaError),

    #[error("cannot compose notifications: {0}")]
    Compose(#[from] NotifyError),
}

/// Where the two tables live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRanges {
    pub tender_sheet_id: String,
    pub tender_range: String,
    pub users_sheet_id: String,
    pub users_range: String,
}

/// Whether a run waits for its notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// Spawn dispatch and return right away.
    Background,
    /// Wait for every send and return the report.
    Await,
}

pub struct PipelineOutcome {
    pub group: MatchGroup,
    /// Present only for [`DispatchMode::Await`].
    pub report: Option<DispatchReport>,
}

pub struct Pipeline {
    pub authorizer: Arc<dyn Authorizer>,
    pub sheets: Arc<dyn SheetSource>,
    pub ranges: SheetRanges,
    pub engine: MatchEngine,
    pub composer: Composer,
    pub dispatcher: Arc<Dispatcher>,
}

impl Pipeline {
    pub async fn run(&self, mode: DispatchMode) -> Result<PipelineOutcome, PipelineError> {
        let credential = self.authorizer.authorize().await?;

        let r = &self.ranges;
        let (tenders, users) = tokio::try_join!(
            self.sheets.fetch_range(&credential, &r.tender_sheet_id, &r.tender_range),
            self.sheets.fetch_range(&credential, &r.users_sheet_id, &r.users_range),
        )?;

        let tenders = decode_tenders(tenders.as_deref())?;
        let users = decode_users(users.as_deref())?;

        let group = self.engine.compute(&tenders, users.rows());
        let payloads = self.composer.compose(&group, &users)?;

        info!(
            predicate = self.engine.predicate_name(),
            renderer = self.composer.renderer_name(),
            tenders = tenders.len(),
            users = users.len(),
            recipients = group.len(),
            matches = group.entry_count(),
            "Matching complete"
        );

        let report = match mode {
            DispatchMode::Background => {
                // Detached; the dispatcher logs every outcome itself.
                drop(self.dispatcher.spawn(payloads));
                None
            }
            DispatchMode::Await => Some(self.dispatcher.dispatch(payloads).await),
        };

        Ok(PipelineOutcome { group, report })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory collaborators shared by pipeline and router tests.

    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use tender_core::matching::{Composite, LinkBuilder};
    use tender_core::{CellValue, LinkSegment, MatchEngine};
    use tender_notify::{
        Composer, Dispatcher, Envelope, FreeTextRenderer, NotificationPayload, NotifyError,
        Transport, TransportResponse,
    };
    use tender_sheets::client::Table;
    use tender_sheets::{Authorizer, Credential, SheetSource, SheetsError};

    use super::{Pipeline, SheetRanges};

    pub struct StaticAuthorizer {
        pub fail: bool,
    }

    #[async_trait::async_trait]
    impl Authorizer for StaticAuthorizer {
        async fn authorize(&self) -> Result<Credential, SheetsError> {
            if self.fail {
                Err(SheetsError::Auth("token revoked".to_string()))
            } else {
                Ok(Credential::new("test-token"))
            }
        }
    }

    /// Serves fixed tables keyed by `(sheet id, range)`.
    #[derive(Default)]
    pub struct StaticSheets {
        pub tables: HashMap<(String, String), Table>,
        pub fetched: Mutex<Vec<(String, String)>>,
    }

    #[async_trait::async_trait]
    impl SheetSource for StaticSheets {
        async fn fetch_range(
            &self,
            credential: &Credential,
            sheet_id: &str,
            range: &str,
        ) -> Result<Option<Table>, SheetsError> {
            assert_eq!(credential.access_token(), "test-token");
            let key = (sheet_id.to_string(), range.to_string());
            self.fetched.lock().unwrap().push(key.clone());
            Ok(self.tables.get(&key).cloned())
        }
    }

    pub struct CountingTransport {
        pub sent: Arc<AtomicUsize>,
        pub fail_for: Vec<String>,
    }

    #[async_trait::async_trait]
    impl Transport for CountingTransport {
        async fn send(&self, payload: &NotificationPayload) -> Result<TransportResponse, NotifyError> {
            self.sent.fetch_add(1, Ordering::SeqCst);
            if self.fail_for.contains(&payload.recipient) {
                return Err(NotifyError::Status {
                    status: 500,
                    body: "provider down".to_string(),
                });
            }
            Ok(TransportResponse {
                status: 200,
                body: "{}".to_string(),
            })
        }

        fn channel_name(&self) -> &str {
            "counting"
        }
    }

    pub fn row(cells: &[&str]) -> Vec<CellValue> {
        cells.iter().map(|c| CellValue::from(*c)).collect()
    }

    pub fn tender_table() -> Table {
        vec![
            row(&["Name", "Location", "Description", "", "", "", "EMD", "", "Material"]),
            row(&["TenderA", "Pune,Maharashtra", "Girders", "", "", "", "100", "", "steel"]),
            row(&["TenderB", "Goa,Goa", "Cement", "", "", "", "50", "", "cement"]),
        ]
    }

    pub fn user_table() -> Table {
        vec![
            row(&["Id", "City", "State", "Name", "Phone", "", "", "Category", "Material"]),
            row(&["u1", "pune", "maharashtra", "John", "+911", "", "", "Steel", "steel"]),
            row(&["u2", "goa", "goa", "Maria", "+912", "", "", "Cement", "Cement"]),
            row(&["u3", "delhi", "delhi", "Amit", "+913", "", "", "Steel", "steel"]),
        ]
    }

    pub fn ranges() -> SheetRanges {
        SheetRanges {
            tender_sheet_id: "tender-sheet".to_string(),
            tender_range: "Tender".to_string(),
            users_sheet_id: "users-sheet".to_string(),
            users_range: "User".to_string(),
        }
    }

    pub fn sheets(tenders: Option<Table>, users: Option<Table>) -> Arc<StaticSheets> {
        let mut tables = HashMap::new();
        if let Some(t) = tenders {
            tables.insert(("tender-sheet".to_string(), "Tender".to_string()), t);
        }
        if let Some(u) = users {
            tables.insert(("users-sheet".to_string(), "User".to_string()), u);
        }
        Arc::new(StaticSheets {
            tables,
            fetched: Mutex::new(Vec::new()),
        })
    }

    pub fn pipeline(
        sheets: Arc<StaticSheets>,
        sent: &Arc<AtomicUsize>,
        fail_for: &[&str],
        auth_fails: bool,
    ) -> Pipeline {
        Pipeline {
            authorizer: Arc::new(StaticAuthorizer { fail: auth_fails }),
            sheets,
            ranges: ranges(),
            engine: MatchEngine::new(
                Box::new(Composite::strict_cohort()),
                LinkBuilder::new("https://prcommerce-campaign.com", LinkSegment::RowIndex),
            ),
            composer: Composer::new(
                Box::new(FreeTextRenderer::default()),
                Envelope {
                    sender: "+440000".to_string(),
                    callback_data: "Callback data".to_string(),
                    notify_url: "https://www.example.com/whatsapp".to_string(),
                },
            ),
            dispatcher: Arc::new(Dispatcher::new(Arc::new(CountingTransport {
                sent: sent.clone(),
                fail_for: fail_for.iter().map(|s| s.to_string()).collect(),
            }))),
        }
    }
}
