//! Common test utilities for pixio integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::http::{HeaderName, HeaderValue};
use axum::Router;
use axum_test::TestServer;

use pixio_core::{Account, AccountId, PixioError, ProviderError};
use pixio_service::crypto::hmac_sha256_hex;
use pixio_service::razorpay::{CreateOrderRequest, Order};
use pixio_service::{
    create_router, AppState, Collaborators, ImageOutput, ImageProvider, ImageRequest,
    MailMessage, Mailer, PaymentGateway, RazorpayError, ServiceConfig, TokenIssuer,
};
use pixio_store::{MemoryStore, Store};

pub const JWT_SECRET: &str = "test-jwt-secret";
pub const RAZORPAY_KEY_ID: &str = "rzp_test_key";
pub const RAZORPAY_KEY_SECRET: &str = "rzp_test_secret";

/// Payment gateway holding orders in memory.
#[derive(Default)]
pub struct StubGateway {
    orders: Mutex<HashMap<String, Order>>,
    next_id: AtomicUsize,
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn create_order(&self, request: &CreateOrderRequest) -> Result<Order, RazorpayError> {
        let id = format!("order_{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let order = Order {
            id: id.clone(),
            amount: request.amount,
            currency: request.currency.clone(),
            receipt: Some(request.receipt.clone()),
            status: "created".into(),
            notes: request.notes.clone(),
            created_at: 0,
        };
        self.orders.lock().unwrap().insert(id, order.clone());
        Ok(order)
    }

    async fn fetch_order(&self, order_id: &str) -> Result<Order, RazorpayError> {
        self.orders
            .lock()
            .unwrap()
            .get(order_id)
            .cloned()
            .ok_or_else(|| RazorpayError::Api {
                status: 400,
                code: "BAD_REQUEST_ERROR".into(),
                description: "The id provided does not exist".into(),
            })
    }
}

/// Image provider that returns a fixed image, or a scripted failure.
#[derive(Default)]
pub struct StubImages {
    failure: Mutex<Option<ProviderError>>,
    pub requests: Mutex<Vec<ImageRequest>>,
}

impl StubImages {
    pub fn fail_with(&self, error: ProviderError) {
        *self.failure.lock().unwrap() = Some(error);
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ImageProvider for StubImages {
    async fn process(&self, request: ImageRequest) -> Result<ImageOutput, ProviderError> {
        self.requests.lock().unwrap().push(request);
        if let Some(error) = self.failure.lock().unwrap().clone() {
            return Err(error);
        }
        Ok(ImageOutput {
            content_type: "image/png".into(),
            bytes: b"png-bytes".to_vec(),
        })
    }
}

/// Mailer that keeps every message.
#[derive(Default)]
pub struct CapturingMailer {
    sent: Mutex<Vec<MailMessage>>,
}

impl CapturingMailer {
    /// The code in the latest message to `address`.
    pub fn last_code(&self, address: &str) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|m| m.to == address)
            .and_then(|m| {
                m.text
                    .split_whitespace()
                    .find(|w| w.len() == 7 && w.ends_with('.') && w[..6].bytes().all(|b| b.is_ascii_digit()))
                    .map(|w| w[..6].to_string())
            })
    }
}

#[async_trait]
impl Mailer for CapturingMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), PixioError> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// The backing store.
    pub store: Arc<MemoryStore>,
    /// The stub image provider.
    pub images: Arc<StubImages>,
    /// The capturing mailer.
    pub mailer: Arc<CapturingMailer>,
    /// Issuer sharing the service's secret.
    pub tokens: TokenIssuer,
}

pub fn test_config() -> ServiceConfig {
    ServiceConfig {
        listen_addr: "127.0.0.1:0".into(),
        jwt_secret: JWT_SECRET.into(),
        razorpay_key_id: Some(RAZORPAY_KEY_ID.into()),
        razorpay_key_secret: Some(RAZORPAY_KEY_SECRET.into()),
        max_body_bytes: 1024 * 1024,
        request_timeout_seconds: 30,
        provider_timeout_seconds: 5,
        ..ServiceConfig::default()
    }
}

impl TestHarness {
    /// Create a new test harness with an empty store.
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    /// Create a harness around a custom configuration.
    pub fn with_config(config: ServiceConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let images = Arc::new(StubImages::default());
        let mailer = Arc::new(CapturingMailer::default());
        let tokens = TokenIssuer::new(&config.jwt_secret);

        let collaborators = Collaborators {
            gateway: Some(Arc::new(StubGateway::default())),
            images: Some(images.clone()),
            mailer: mailer.clone(),
        };

        let state = AppState::with_collaborators(store.clone(), config, collaborators);
        let router: Router = create_router(state);
        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            store,
            images,
            mailer,
            tokens,
        }
    }

    /// Insert an account with the given balance.
    pub fn create_user(&self, credits: i64) -> Account {
        let account = Account::new(
            "Test User",
            &format!("user-{}@example.com", AccountId::generate()),
            None,
            credits,
        );
        self.store.create_account(&account).expect("Failed to create account");
        account
    }

    /// A valid session token for `account_id`.
    pub fn token(&self, account_id: &AccountId) -> String {
        self.tokens.issue(account_id).expect("Failed to issue token")
    }

    /// Authorization header for `account_id`.
    pub fn auth_header(&self, account_id: &AccountId) -> (HeaderName, HeaderValue) {
        (
            HeaderName::from_static("authorization"),
            HeaderValue::from_str(&format!("Bearer {}", self.token(account_id))).unwrap(),
        )
    }

    /// Current balance of `account_id`.
    pub fn balance(&self, account_id: &AccountId) -> i64 {
        self.store
            .get_account(account_id)
            .unwrap()
            .expect("account exists")
            .credit_balance
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// The checkout signature the gateway would produce.
pub fn sign_payment(order_id: &str, payment_id: &str) -> String {
    hmac_sha256_hex(RAZORPAY_KEY_SECRET, &format!("{order_id}|{payment_id}"))
}
