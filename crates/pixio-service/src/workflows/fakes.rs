//! In-process collaborators for workflow tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use pixio_core::PixioError;

use crate::mail::{MailMessage, Mailer};
use crate::razorpay::{CreateOrderRequest, Order, PaymentGateway, RazorpayError};

/// Mailer that keeps every message.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<MailMessage>>,
    fail: AtomicBool,
}

impl RecordingMailer {
    pub fn fail_next(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn last(&self) -> Option<MailMessage> {
        self.sent.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), PixioError> {
        if self.fail.swap(false, Ordering::SeqCst) {
            return Err(PixioError::DeliveryFailed("relay down".into()));
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// Gateway that stores orders in memory.
#[derive(Default)]
pub struct FakeGateway {
    orders: Mutex<HashMap<String, Order>>,
    next_id: AtomicUsize,
    unavailable: AtomicBool,
    pub fetches: AtomicUsize,
}

impl FakeGateway {
    pub fn set_unavailable(&self) {
        self.unavailable.store(true, Ordering::SeqCst);
    }

    pub fn insert(&self, order: Order) {
        self.orders.lock().unwrap().insert(order.id.clone(), order);
    }

    fn check_available(&self) -> Result<(), RazorpayError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RazorpayError::Api {
                status: 503,
                code: "SERVER_ERROR".into(),
                description: "gateway unavailable".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_order(&self, request: &CreateOrderRequest) -> Result<Order, RazorpayError> {
        self.check_available()?;
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
        self.insert(order.clone());
        Ok(order)
    }

    async fn fetch_order(&self, order_id: &str) -> Result<Order, RazorpayError> {
        self.check_available()?;
        self.fetches.fetch_add(1, Ordering::SeqCst);
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
