//! Checkout service - Orders, Stripe Checkout sessions and fulfillment.
//!
//! Orders are created `pending` before the provider is called. Access is
//! granted only by fulfillment, which is driven by the signed webhook or by
//! the success-page confirmation, whichever arrives first. Fulfillment is
//! idempotent at the repository level; webhook event ids are recorded so
//! redelivered events are acknowledged without reprocessing.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::{Config, PAYMENT_PROVIDER_STRIPE};
use crate::domain::order::normalize_checkout_ids;
use crate::domain::{CheckoutResponse, Course, Order, OrderItem, OrderStatus};
use crate::errors::{AppError, AppResult, OptionExt};
use crate::infra::payments::{CheckoutEvent, SessionObject, WebhookEvent};
use crate::infra::repositories::FulfillmentOutcome;
use crate::infra::{
    verify_webhook_signature, CheckoutSessionRequest, Collection, DualWriter, PaymentGateway,
    UnitOfWork,
};

#[async_trait]
pub trait CheckoutService: Send + Sync {
    /// Open a checkout for `course_ids`, or for the whole cart when empty
    async fn create_checkout(
        &self,
        user_id: Uuid,
        course_ids: Vec<Uuid>,
    ) -> AppResult<CheckoutResponse>;

    /// Verify and apply a provider webhook
    async fn handle_webhook(&self, payload: &[u8], signature: Option<&str>) -> AppResult<()>;

    /// Success-page fallback when the webhook has not arrived yet
    async fn confirm_session(&self, user_id: Uuid, session_id: &str) -> AppResult<Order>;

    async fn list_orders(&self, user_id: Uuid) -> AppResult<Vec<Order>>;
}

pub struct CheckoutManager<U: UnitOfWork> {
    uow: Arc<U>,
    gateway: Option<Arc<dyn PaymentGateway>>,
    writer: DualWriter,
    config: Config,
}

impl<U: UnitOfWork> CheckoutManager<U> {
    pub fn new(
        uow: Arc<U>,
        gateway: Option<Arc<dyn PaymentGateway>>,
        writer: DualWriter,
        config: Config,
    ) -> Self {
        Self {
            uow,
            gateway,
            writer,
            config,
        }
    }

    fn gateway(&self) -> AppResult<&Arc<dyn PaymentGateway>> {
        self.gateway
            .as_ref()
            .ok_or(AppError::NotConfigured("Payments"))
    }

    /// Resolve and check every course of a checkout, keeping request order.
    ///
    /// Cart checkouts skip courses that are no longer published, the same
    /// lines the cart view hides; explicit ids must all be purchasable.
    async fn purchasable_courses(
        &self,
        user_id: Uuid,
        ids: &[Uuid],
        from_cart: bool,
    ) -> AppResult<Vec<Course>> {
        let mut found: HashMap<Uuid, Course> = self
            .uow
            .courses()
            .find_many(ids.to_vec())
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect();

        let mut courses = Vec::with_capacity(ids.len());
        for id in ids {
            let course = match found.remove(id) {
                Some(course) if from_cart && !course.is_published() => {
                    tracing::debug!(user_id = %user_id, course_id = %id, "Skipping unavailable cart item");
                    continue;
                }
                Some(course) => course,
                None if from_cart => continue,
                None => return Err(AppError::bad_request(format!("Unknown course {}", id))),
            };
            course.ensure_purchasable_by(user_id)?;
            if course.is_free() {
                return Err(AppError::bad_request(format!(
                    "'{}' is free; enroll in it directly",
                    course.title
                )));
            }
            courses.push(course);
        }
        if courses.is_empty() {
            return Err(AppError::validation("Nothing to check out"));
        }

        let owned = self
            .uow
            .enrollments()
            .enrolled_course_ids(user_id, ids.to_vec())
            .await?;
        if let Some(course) = courses.iter().find(|c| owned.contains(&c.id)) {
            return Err(AppError::conflict(format!(
                "You already own '{}'",
                course.title
            )));
        }

        Ok(courses)
    }

    async fn mirror_order(&self, order: &Order) {
        self.writer.mirror(Collection::Orders, order.id, order).await;
    }

    /// Grant access for a paid order and mirror what changed.
    async fn fulfill(&self, order_id: Uuid, payment_intent_id: Option<String>) -> AppResult<Order> {
        let fulfillment = self
            .uow
            .orders()
            .fulfill(order_id, payment_intent_id)
            .await?;

        match fulfillment.outcome {
            FulfillmentOutcome::Fulfilled => {
                for enrollment in &fulfillment.new_enrollments {
                    self.writer
                        .mirror(Collection::Enrollments, enrollment.id, enrollment)
                        .await;
                }
                self.mirror_order(&fulfillment.order).await;
                tracing::info!(
                    order_id = %order_id,
                    user_id = %fulfillment.order.user_id,
                    enrollments = fulfillment.new_enrollments.len(),
                    "Order fulfilled"
                );
            }
            FulfillmentOutcome::AlreadyFulfilled => {
                tracing::debug!(order_id = %order_id, "Order already fulfilled");
            }
            FulfillmentOutcome::Ignored => {
                tracing::warn!(
                    order_id = %order_id,
                    status = %fulfillment.order.status,
                    "Payment reported for a closed order"
                );
            }
        }

        Ok(fulfillment.order)
    }

    async fn close(&self, order_id: Uuid, status: OrderStatus) -> AppResult<()> {
        match self.uow.orders().transition(order_id, status).await? {
            Some(order) => {
                self.mirror_order(&order).await;
                tracing::info!(order_id = %order_id, %status, "Order closed");
            }
            None => tracing::debug!(order_id = %order_id, %status, "Order no longer pending"),
        }
        Ok(())
    }

    /// Order referenced by a session: metadata first, then the stored session id
    async fn order_for(&self, session: &SessionObject) -> AppResult<Option<Order>> {
        if let Some(id) = session.order_id() {
            if let Some(order) = self.uow.orders().find_by_id(id).await? {
                return Ok(Some(order));
            }
        }
        self.uow.orders().find_by_session_id(&session.id).await
    }

    async fn apply(&self, event: CheckoutEvent) -> AppResult<()> {
        let (session, next) = match event {
            CheckoutEvent::Fulfill(session) => (session, OrderStatus::Paid),
            CheckoutEvent::Failed(session) => (session, OrderStatus::Failed),
            CheckoutEvent::Expired(session) => (session, OrderStatus::Expired),
            CheckoutEvent::AwaitingPayment(session) => {
                tracing::info!(session_id = %session.id, "Checkout completed, awaiting payment");
                return Ok(());
            }
            CheckoutEvent::Ignored => return Ok(()),
        };

        let Some(order) = self.order_for(&session).await? else {
            tracing::warn!(session_id = %session.id, "No order for checkout session");
            return Ok(());
        };

        match next {
            OrderStatus::Paid => self.fulfill(order.id, session.payment_intent).await.map(|_| ()),
            status => self.close(order.id, status).await,
        }
    }
}

#[async_trait]
impl<U: UnitOfWork> CheckoutService for CheckoutManager<U> {
    async fn create_checkout(
        &self,
        user_id: Uuid,
        course_ids: Vec<Uuid>,
    ) -> AppResult<CheckoutResponse> {
        let gateway = self.gateway()?.clone();

        let from_cart = course_ids.is_empty();
        let requested = if from_cart {
            self.uow
                .carts()
                .list(user_id)
                .await?
                .into_iter()
                .map(|item| item.course_id)
                .collect()
        } else {
            course_ids
        };
        let ids = normalize_checkout_ids(&requested)?;
        if ids.is_empty() {
            return Err(AppError::validation("Nothing to check out"));
        }

        let courses = self.purchasable_courses(user_id, &ids, from_cart).await?;
        let buyer = self
            .uow
            .users()
            .find_by_id(user_id)
            .await?
            .ok_or_not_found()?;

        let items: Vec<OrderItem> = courses.iter().map(OrderItem::from).collect();
        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4(),
            user_id,
            status: OrderStatus::Pending,
            amount_total_cents: items.iter().map(|i| i.price_cents).sum(),
            currency: self.config.currency.clone(),
            stripe_session_id: None,
            payment_intent_id: None,
            items,
            created_at: now,
            updated_at: now,
            fulfilled_at: None,
        };
        let order = self.uow.orders().create(order).await?;
        self.mirror_order(&order).await;

        let request = CheckoutSessionRequest {
            order_id: order.id,
            user_id,
            customer_email: buyer.email,
            currency: order.currency.clone(),
            items: order.items.clone(),
            success_url: self.config.checkout_success_url(),
            cancel_url: self.config.checkout_cancel_url(),
        };

        let session = match gateway.create_checkout_session(request).await {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(order_id = %order.id, error = %e, "Checkout session creation failed");
                self.close(order.id, OrderStatus::Failed).await?;
                return Err(e);
            }
        };

        let order = self
            .uow
            .orders()
            .attach_session(order.id, session.id.clone())
            .await?;
        self.mirror_order(&order).await;

        tracing::info!(
            order_id = %order.id,
            user_id = %user_id,
            amount_cents = order.amount_total_cents,
            "Checkout started"
        );

        Ok(CheckoutResponse {
            order_id: order.id,
            session_id: session.id,
            checkout_url: session.url,
        })
    }

    async fn handle_webhook(&self, payload: &[u8], signature: Option<&str>) -> AppResult<()> {
        if !self.config.payments_configured() {
            return Err(AppError::NotConfigured("Payments"));
        }

        let header = signature
            .ok_or_else(|| AppError::WebhookSignature("missing signature header".into()))?;
        verify_webhook_signature(
            payload,
            header,
            self.config.stripe_webhook_secret(),
            Utc::now().timestamp(),
        )?;

        let event = WebhookEvent::parse(payload)?;
        if self.uow.webhook_events().is_processed(&event.id).await? {
            tracing::debug!(event_id = %event.id, "Duplicate webhook event");
            return Ok(());
        }

        tracing::info!(event_id = %event.id, event_type = %event.event_type, "Webhook received");
        self.apply(event.checkout_event()?).await?;

        self.uow
            .webhook_events()
            .record(PAYMENT_PROVIDER_STRIPE, &event.id, &event.event_type)
            .await
    }

    async fn confirm_session(&self, user_id: Uuid, session_id: &str) -> AppResult<Order> {
        let order = self
            .uow
            .orders()
            .find_by_session_id(session_id)
            .await?
            .filter(|o| o.user_id == user_id)
            .ok_or_not_found()?;

        if order.status != OrderStatus::Pending {
            return Ok(order);
        }

        let session = self
            .gateway()?
            .retrieve_checkout_session(session_id)
            .await?;
        if !session.payment_status.is_settled() {
            return Ok(order);
        }

        self.fulfill(order.id, session.payment_intent_id).await
    }

    async fn list_orders(&self, user_id: Uuid) -> AppResult<Vec<Order>> {
        self.uow.orders().list_by_user(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CartItem, CourseStatus, Enrollment, UserRole};
    use crate::infra::repositories::Fulfillment;
    use crate::infra::{
        sign_webhook_payload, CheckoutSessionInfo, InMemoryDocumentStore, MockPaymentGateway,
        SessionPaymentStatus,
    };
    use crate::services::test_support::{course, memory_writer, user, Mocks, TestUnitOfWork};
    use mockall::predicate::eq;

    const WEBHOOK_SECRET: &str = "whsec_test_secret";

    fn service(
        mocks: Mocks,
        gateway: MockPaymentGateway,
    ) -> (CheckoutManager<TestUnitOfWork>, Arc<InMemoryDocumentStore>) {
        let (writer, store) = memory_writer();
        let gateway: Arc<dyn PaymentGateway> = Arc::new(gateway);
        (
            CheckoutManager::new(mocks.into_uow(), Some(gateway), writer, Config::for_tests()),
            store,
        )
    }

    fn pending_order(user_id: Uuid) -> Order {
        let now = Utc::now();
        Order {
            id: Uuid::new_v4(),
            user_id,
            status: OrderStatus::Pending,
            amount_total_cents: 4999,
            currency: "usd".into(),
            stripe_session_id: Some("cs_test_1".into()),
            payment_intent_id: None,
            items: vec![OrderItem {
                course_id: Uuid::new_v4(),
                title: "Rust for Web Developers".into(),
                price_cents: 4999,
            }],
            created_at: now,
            updated_at: now,
            fulfilled_at: None,
        }
    }

    fn paid(mut order: Order, payment_intent_id: Option<String>) -> Fulfillment {
        order.status = OrderStatus::Paid;
        order.payment_intent_id = payment_intent_id;
        order.fulfilled_at = Some(Utc::now());
        let new_enrollments = order
            .items
            .iter()
            .map(|item| Enrollment {
                id: Uuid::new_v4(),
                user_id: order.user_id,
                course_id: item.course_id,
                order_id: Some(order.id),
                enrolled_at: Utc::now(),
            })
            .collect();
        Fulfillment {
            order,
            outcome: FulfillmentOutcome::Fulfilled,
            new_enrollments,
        }
    }

    fn signed(event: serde_json::Value) -> (Vec<u8>, String) {
        let payload = event.to_string().into_bytes();
        let header =
            sign_webhook_payload(&payload, WEBHOOK_SECRET, Utc::now().timestamp()).unwrap();
        (payload, header)
    }

    fn session_event(kind: &str, order_id: Uuid, payment_status: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "evt_test_1",
            "type": kind,
            "data": {"object": {
                "id": "cs_test_1",
                "payment_status": payment_status,
                "payment_intent": "pi_test_1",
                "metadata": {"order_id": order_id.to_string()}
            }}
        })
    }

    #[tokio::test]
    async fn test_checkout_uses_cart_when_no_ids_given() {
        let buyer = user(UserRole::Student);
        let buyer_id = buyer.id;
        let first = course(Uuid::new_v4(), CourseStatus::Published, 1999);
        let second = course(Uuid::new_v4(), CourseStatus::Published, 3000);
        let cart: Vec<CartItem> = [first.id, second.id, first.id]
            .iter()
            .map(|id| CartItem {
                user_id: buyer_id,
                course_id: *id,
                added_at: Utc::now(),
            })
            .collect();
        let courses = vec![second.clone(), first.clone()];

        let mut mocks = Mocks::default();
        mocks
            .carts
            .expect_list()
            .returning(move |_| Ok(cart.clone()));
        mocks
            .courses
            .expect_find_many()
            .returning(move |_| Ok(courses.clone()));
        mocks
            .enrollments
            .expect_enrolled_course_ids()
            .returning(|_, _| Ok(Vec::new()));
        mocks
            .users
            .expect_find_by_id()
            .returning(move |_| Ok(Some(buyer.clone())));
        mocks.orders.expect_create().returning(Ok);
        mocks
            .orders
            .expect_attach_session()
            .returning(move |id, session_id| {
                let mut order = pending_order(buyer_id);
                order.id = id;
                order.stripe_session_id = Some(session_id);
                Ok(order)
            });

        let first_id = first.id;
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_create_checkout_session()
            .withf(move |req| {
                req.items.len() == 2
                    && req.items[0].course_id == first_id
                    && req.customer_email == "ada@example.com"
                    && req.success_url.ends_with("session_id={CHECKOUT_SESSION_ID}")
            })
            .returning(|_| {
                Ok(CheckoutSessionInfo {
                    id: "cs_test_1".into(),
                    url: Some("https://checkout.stripe.com/c/pay/cs_test_1".into()),
                    payment_status: SessionPaymentStatus::Unpaid,
                    payment_intent_id: None,
                })
            });

        let (service, store) = service(mocks, gateway);
        let response = service.create_checkout(buyer_id, Vec::new()).await.unwrap();

        assert_eq!(response.session_id, "cs_test_1");
        assert!(response.checkout_url.is_some());
        assert_eq!(store.len(Collection::Orders).await, 1);
    }

    #[tokio::test]
    async fn test_cart_checkout_skips_unpublished_items() {
        let buyer = user(UserRole::Student);
        let buyer_id = buyer.id;
        let live = course(Uuid::new_v4(), CourseStatus::Published, 1999);
        let mut withdrawn = course(Uuid::new_v4(), CourseStatus::Draft, 2999);
        withdrawn.title = "Withdrawn Course".into();
        let cart: Vec<CartItem> = [live.id, withdrawn.id]
            .iter()
            .map(|id| CartItem {
                user_id: buyer_id,
                course_id: *id,
                added_at: Utc::now(),
            })
            .collect();
        let courses = vec![live.clone(), withdrawn.clone()];

        let mut mocks = Mocks::default();
        mocks
            .carts
            .expect_list()
            .returning(move |_| Ok(cart.clone()));
        mocks
            .courses
            .expect_find_many()
            .returning(move |_| Ok(courses.clone()));
        mocks
            .enrollments
            .expect_enrolled_course_ids()
            .returning(|_, _| Ok(Vec::new()));
        mocks
            .users
            .expect_find_by_id()
            .returning(move |_| Ok(Some(buyer.clone())));
        mocks.orders.expect_create().returning(Ok);
        mocks
            .orders
            .expect_attach_session()
            .returning(move |id, session_id| {
                let mut order = pending_order(buyer_id);
                order.id = id;
                order.stripe_session_id = Some(session_id);
                Ok(order)
            });

        let live_id = live.id;
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_create_checkout_session()
            .withf(move |req| req.items.len() == 1 && req.items[0].course_id == live_id)
            .times(1)
            .returning(|_| {
                Ok(CheckoutSessionInfo {
                    id: "cs_test_1".into(),
                    url: None,
                    payment_status: SessionPaymentStatus::Unpaid,
                    payment_intent_id: None,
                })
            });

        let (service, _) = service(mocks, gateway);
        let response = service.create_checkout(buyer_id, Vec::new()).await.unwrap();
        assert_eq!(response.session_id, "cs_test_1");
    }

    #[tokio::test]
    async fn test_cart_of_only_unpublished_items() {
        let buyer_id = Uuid::new_v4();
        let withdrawn = course(Uuid::new_v4(), CourseStatus::Archived, 2999);
        let cart = vec![CartItem {
            user_id: buyer_id,
            course_id: withdrawn.id,
            added_at: Utc::now(),
        }];

        let mut mocks = Mocks::default();
        mocks
            .carts
            .expect_list()
            .returning(move |_| Ok(cart.clone()));
        mocks
            .courses
            .expect_find_many()
            .returning(move |_| Ok(vec![withdrawn.clone()]));
        mocks.orders.expect_create().never();

        let (service, _) = service(mocks, MockPaymentGateway::new());
        let result = service.create_checkout(buyer_id, Vec::new()).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_explicit_unpublished_course_is_rejected() {
        let c = course(Uuid::new_v4(), CourseStatus::Draft, 1999);
        let course_id = c.id;

        let mut mocks = Mocks::default();
        mocks
            .courses
            .expect_find_many()
            .returning(move |_| Ok(vec![c.clone()]));
        mocks.orders.expect_create().never();

        let (service, _) = service(mocks, MockPaymentGateway::new());
        let result = service.create_checkout(Uuid::new_v4(), vec![course_id]).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_checkout_rejects_owned_course() {
        let buyer = user(UserRole::Student);
        let c = course(Uuid::new_v4(), CourseStatus::Published, 1999);
        let course_id = c.id;

        let mut mocks = Mocks::default();
        mocks
            .courses
            .expect_find_many()
            .returning(move |_| Ok(vec![c.clone()]));
        mocks
            .enrollments
            .expect_enrolled_course_ids()
            .returning(move |_, _| Ok(vec![course_id]));
        mocks.orders.expect_create().never();

        let (service, _) = service(mocks, MockPaymentGateway::new());
        let result = service.create_checkout(buyer.id, vec![course_id]).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_checkout_rejects_free_course() {
        let c = course(Uuid::new_v4(), CourseStatus::Published, 0);
        let course_id = c.id;

        let mut mocks = Mocks::default();
        mocks
            .courses
            .expect_find_many()
            .returning(move |_| Ok(vec![c.clone()]));

        let (service, _) = service(mocks, MockPaymentGateway::new());
        let result = service.create_checkout(Uuid::new_v4(), vec![course_id]).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_empty_cart_checkout() {
        let mut mocks = Mocks::default();
        mocks.carts.expect_list().returning(|_| Ok(Vec::new()));

        let (service, _) = service(mocks, MockPaymentGateway::new());
        let result = service.create_checkout(Uuid::new_v4(), Vec::new()).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_provider_failure_fails_order() {
        let buyer = user(UserRole::Student);
        let buyer_id = buyer.id;
        let c = course(Uuid::new_v4(), CourseStatus::Published, 1999);
        let course_id = c.id;

        let mut mocks = Mocks::default();
        mocks
            .courses
            .expect_find_many()
            .returning(move |_| Ok(vec![c.clone()]));
        mocks
            .enrollments
            .expect_enrolled_course_ids()
            .returning(|_, _| Ok(Vec::new()));
        mocks
            .users
            .expect_find_by_id()
            .returning(move |_| Ok(Some(buyer.clone())));
        mocks.orders.expect_create().returning(Ok);
        mocks
            .orders
            .expect_transition()
            .withf(|_, status| *status == OrderStatus::Failed)
            .times(1)
            .returning(move |id, status| {
                let mut order = pending_order(buyer_id);
                order.id = id;
                order.status = status;
                Ok(Some(order))
            });
        mocks.orders.expect_attach_session().never();

        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_create_checkout_session()
            .returning(|_| Err(AppError::payment_provider("card network down")));

        let (service, _) = service(mocks, gateway);
        let result = service.create_checkout(buyer_id, vec![course_id]).await;
        assert!(matches!(result, Err(AppError::PaymentProvider(_))));
    }

    #[tokio::test]
    async fn test_checkout_without_payments_configured() {
        let (writer, _) = memory_writer();
        let service = CheckoutManager::new(
            Mocks::default().into_uow(),
            None,
            writer,
            Config::for_tests(),
        );

        let result = service.create_checkout(Uuid::new_v4(), vec![Uuid::new_v4()]).await;
        assert!(matches!(result, Err(AppError::NotConfigured(_))));
    }

    #[tokio::test]
    async fn test_webhook_rejects_bad_signature() {
        let (payload, _) = signed(session_event(
            "checkout.session.completed",
            Uuid::new_v4(),
            "paid",
        ));
        let (service, _) = service(Mocks::default(), MockPaymentGateway::new());

        let result = service
            .handle_webhook(&payload, Some("t=1,v1=deadbeef"))
            .await;
        assert!(matches!(result, Err(AppError::WebhookSignature(_))));

        let result = service.handle_webhook(&payload, None).await;
        assert!(matches!(result, Err(AppError::WebhookSignature(_))));
    }

    #[tokio::test]
    async fn test_webhook_fulfills_and_records_event() {
        let order = pending_order(Uuid::new_v4());
        let order_id = order.id;
        let lookup = order.clone();

        let mut mocks = Mocks::default();
        mocks
            .webhook_events
            .expect_is_processed()
            .with(eq("evt_test_1"))
            .returning(|_| Ok(false));
        mocks
            .orders
            .expect_find_by_id()
            .with(eq(order_id))
            .returning(move |_| Ok(Some(lookup.clone())));
        mocks
            .orders
            .expect_fulfill()
            .withf(|_, pi| pi.as_deref() == Some("pi_test_1"))
            .times(1)
            .returning(move |_, pi| Ok(paid(order.clone(), pi)));
        mocks
            .webhook_events
            .expect_record()
            .with(eq("stripe"), eq("evt_test_1"), eq("checkout.session.completed"))
            .times(1)
            .returning(|_, _, _| Ok(()));

        let (service, store) = service(mocks, MockPaymentGateway::new());
        let (payload, header) = signed(session_event("checkout.session.completed", order_id, "paid"));
        service.handle_webhook(&payload, Some(&header)).await.unwrap();

        assert_eq!(store.len(Collection::Enrollments).await, 1);
        assert_eq!(store.len(Collection::Orders).await, 1);
    }

    #[tokio::test]
    async fn test_duplicate_webhook_is_acknowledged() {
        let mut mocks = Mocks::default();
        mocks
            .webhook_events
            .expect_is_processed()
            .returning(|_| Ok(true));
        mocks.orders.expect_fulfill().never();
        mocks.webhook_events.expect_record().never();

        let (service, _) = service(mocks, MockPaymentGateway::new());
        let (payload, header) = signed(session_event(
            "checkout.session.completed",
            Uuid::new_v4(),
            "paid",
        ));
        assert!(service.handle_webhook(&payload, Some(&header)).await.is_ok());
    }

    #[tokio::test]
    async fn test_expired_session_falls_back_to_session_lookup() {
        let order = pending_order(Uuid::new_v4());
        let lookup = order.clone();

        let mut mocks = Mocks::default();
        mocks
            .webhook_events
            .expect_is_processed()
            .returning(|_| Ok(false));
        mocks.orders.expect_find_by_id().returning(|_| Ok(None));
        mocks
            .orders
            .expect_find_by_session_id()
            .with(eq("cs_test_1"))
            .returning(move |_| Ok(Some(lookup.clone())));
        mocks
            .orders
            .expect_transition()
            .withf(|_, status| *status == OrderStatus::Expired)
            .times(1)
            .returning(move |_, status| {
                let mut closed = order.clone();
                closed.status = status;
                Ok(Some(closed))
            });
        mocks
            .webhook_events
            .expect_record()
            .returning(|_, _, _| Ok(()));

        let (service, _) = service(mocks, MockPaymentGateway::new());
        let (payload, header) = signed(session_event(
            "checkout.session.expired",
            Uuid::new_v4(),
            "unpaid",
        ));
        service.handle_webhook(&payload, Some(&header)).await.unwrap();
    }

    #[tokio::test]
    async fn test_confirm_session_fulfills_when_paid() {
        let buyer_id = Uuid::new_v4();
        let order = pending_order(buyer_id);
        let lookup = order.clone();

        let mut mocks = Mocks::default();
        mocks
            .orders
            .expect_find_by_session_id()
            .returning(move |_| Ok(Some(lookup.clone())));
        mocks
            .orders
            .expect_fulfill()
            .times(1)
            .returning(move |_, pi| Ok(paid(order.clone(), pi)));

        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_retrieve_checkout_session()
            .with(eq("cs_test_1"))
            .returning(|id| {
                Ok(CheckoutSessionInfo {
                    id: id.to_string(),
                    url: None,
                    payment_status: SessionPaymentStatus::Paid,
                    payment_intent_id: Some("pi_test_9".into()),
                })
            });

        let (service, _) = service(mocks, gateway);
        let confirmed = service.confirm_session(buyer_id, "cs_test_1").await.unwrap();

        assert_eq!(confirmed.status, OrderStatus::Paid);
        assert_eq!(confirmed.payment_intent_id.as_deref(), Some("pi_test_9"));
    }

    fn settled(order: Order, outcome: FulfillmentOutcome) -> Fulfillment {
        Fulfillment {
            order,
            outcome,
            new_enrollments: Vec::new(),
        }
    }

    fn replay_mocks(order: Order, current: Order, outcome: FulfillmentOutcome) -> Mocks {
        let order_id = order.id;
        let mut mocks = Mocks::default();
        mocks
            .webhook_events
            .expect_is_processed()
            .returning(|_| Ok(false));
        mocks
            .orders
            .expect_find_by_id()
            .with(eq(order_id))
            .returning(move |_| Ok(Some(order.clone())));
        mocks
            .orders
            .expect_fulfill()
            .times(1)
            .returning(move |_, _| Ok(settled(current.clone(), outcome)));
        mocks
            .webhook_events
            .expect_record()
            .with(eq("stripe"), eq("evt_test_1"), eq("checkout.session.completed"))
            .times(1)
            .returning(|_, _, _| Ok(()));
        mocks
    }

    #[tokio::test]
    async fn test_replayed_payment_for_paid_order_mirrors_nothing() {
        let order = pending_order(Uuid::new_v4());
        let order_id = order.id;
        let mut current = order.clone();
        current.status = OrderStatus::Paid;
        current.fulfilled_at = Some(Utc::now());

        let mocks = replay_mocks(order, current, FulfillmentOutcome::AlreadyFulfilled);
        let (service, store) = service(mocks, MockPaymentGateway::new());
        let (payload, header) = signed(session_event("checkout.session.completed", order_id, "paid"));
        service.handle_webhook(&payload, Some(&header)).await.unwrap();

        assert_eq!(store.len(Collection::Enrollments).await, 0);
        assert_eq!(store.len(Collection::Orders).await, 0);
    }

    #[tokio::test]
    async fn test_payment_for_expired_order_is_ignored() {
        let order = pending_order(Uuid::new_v4());
        let order_id = order.id;
        let mut current = order.clone();
        current.status = OrderStatus::Expired;

        let mocks = replay_mocks(order, current, FulfillmentOutcome::Ignored);
        let (service, store) = service(mocks, MockPaymentGateway::new());
        let (payload, header) = signed(session_event("checkout.session.completed", order_id, "paid"));
        service.handle_webhook(&payload, Some(&header)).await.unwrap();

        assert_eq!(store.len(Collection::Enrollments).await, 0);
        assert_eq!(store.len(Collection::Orders).await, 0);
    }

    #[tokio::test]
    async fn test_webhook_for_unknown_order_is_recorded() {
        let mut mocks = Mocks::default();
        mocks
            .webhook_events
            .expect_is_processed()
            .returning(|_| Ok(false));
        mocks.orders.expect_find_by_id().returning(|_| Ok(None));
        mocks
            .orders
            .expect_find_by_session_id()
            .returning(|_| Ok(None));
        mocks.orders.expect_fulfill().never();
        mocks
            .webhook_events
            .expect_record()
            .with(eq("stripe"), eq("evt_test_1"), eq("checkout.session.completed"))
            .times(1)
            .returning(|_, _, _| Ok(()));

        let (service, store) = service(mocks, MockPaymentGateway::new());
        let (payload, header) = signed(session_event(
            "checkout.session.completed",
            Uuid::new_v4(),
            "paid",
        ));
        service.handle_webhook(&payload, Some(&header)).await.unwrap();
        assert_eq!(store.len(Collection::Orders).await, 0);
    }

    #[tokio::test]
    async fn test_confirm_session_returns_settled_order_as_is() {
        let buyer_id = Uuid::new_v4();
        let mut order = pending_order(buyer_id);
        order.status = OrderStatus::Paid;

        let mut mocks = Mocks::default();
        mocks
            .orders
            .expect_find_by_session_id()
            .returning(move |_| Ok(Some(order.clone())));
        mocks.orders.expect_fulfill().never();

        let mut gateway = MockPaymentGateway::new();
        gateway.expect_retrieve_checkout_session().never();

        let (service, _) = service(mocks, gateway);
        let confirmed = service.confirm_session(buyer_id, "cs_test_1").await.unwrap();
        assert_eq!(confirmed.status, OrderStatus::Paid);
    }

    #[tokio::test]
    async fn test_confirm_session_of_another_user() {
        let order = pending_order(Uuid::new_v4());

        let mut mocks = Mocks::default();
        mocks
            .orders
            .expect_find_by_session_id()
            .returning(move |_| Ok(Some(order.clone())));

        let (service, _) = service(mocks, MockPaymentGateway::new());
        let result = service.confirm_session(Uuid::new_v4(), "cs_test_1").await;
        assert!(matches!(result, Err(AppError::NotFound)));
    }
}
