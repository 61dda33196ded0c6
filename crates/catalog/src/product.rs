use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use waxmarket_core::{money, Aggregate, AggregateId, AggregateRoot, AlbumId, DomainError, ProviderId};
use waxmarket_events::Event;

/// Digital products are exempt from scarcity: a declared stock below this
/// threshold is replaced with [`DIGITAL_STOCK_SENTINEL`].
pub const DIGITAL_STOCK_THRESHOLD: i64 = 999;

/// Sentinel stock value representing "effectively unlimited" digital copies.
pub const DIGITAL_STOCK_SENTINEL: i64 = 9999;

/// At or below this count a product is surfaced as low stock in the catalog.
pub const LOW_STOCK_THRESHOLD: i64 = 5;

/// Product identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub AggregateId);

impl ProductId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ProductId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Sale format of a listed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductType {
    Physical,
    Digital,
}

impl ProductType {
    /// The other sale format of the same album.
    pub fn alternative(self) -> Self {
        match self {
            ProductType::Physical => ProductType::Digital,
            ProductType::Digital => ProductType::Physical,
        }
    }
}

/// Relative stock mutation direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockDirection {
    Increment,
    Decrement,
}

/// Derived availability state used by catalog search.
///
/// A pure function of the stock counter; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    InStock,
    LowStock,
    OutOfStock,
}

impl Availability {
    pub fn from_stock(stock: i64) -> Self {
        if stock <= 0 {
            Availability::OutOfStock
        } else if stock <= LOW_STOCK_THRESHOLD {
            Availability::LowStock
        } else {
            Availability::InStock
        }
    }

    pub fn is_available(self) -> bool {
        !matches!(self, Availability::OutOfStock)
    }
}

/// Substitute the digital sentinel for under-threshold digital stock.
fn normalized_stock(product_type: ProductType, quantity: i64) -> i64 {
    match product_type {
        ProductType::Digital if quantity < DIGITAL_STOCK_THRESHOLD => DIGITAL_STOCK_SENTINEL,
        _ => quantity,
    }
}

/// Aggregate root: Product.
///
/// Owns the authoritative stock counter per listed record and every invariant
/// around mutating it. No other component writes stock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    id: ProductId,
    provider_id: Option<ProviderId>,
    album_id: Option<AlbumId>,
    price_cents: u64,
    stock: i64,
    product_type: ProductType,
    active: bool,
    featured: bool,
    version: u64,
    created: bool,
}

impl Product {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ProductId) -> Self {
        Self {
            id,
            provider_id: None,
            album_id: None,
            price_cents: 0,
            stock: 0,
            product_type: ProductType::Physical,
            active: false,
            featured: false,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn provider_id(&self) -> Option<ProviderId> {
        self.provider_id
    }

    pub fn album_id(&self) -> Option<AlbumId> {
        self.album_id
    }

    pub fn price_cents(&self) -> u64 {
        self.price_cents
    }

    pub fn stock(&self) -> i64 {
        self.stock
    }

    pub fn product_type(&self) -> ProductType {
        self.product_type
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_featured(&self) -> bool {
        self.featured
    }

    pub fn exists(&self) -> bool {
        self.created
    }

    pub fn availability(&self) -> Availability {
        Availability::from_stock(self.stock)
    }

    /// Ownership predicate for the authorization boundary.
    pub fn is_owned_by(&self, provider_id: ProviderId) -> bool {
        self.provider_id == Some(provider_id)
    }
}

impl AggregateRoot for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: ListProduct (a provider puts a record on the marketplace).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListProduct {
    pub provider_id: ProviderId,
    pub product_id: ProductId,
    pub album_id: AlbumId,
    pub price_cents: u64,
    pub stock: i64,
    pub product_type: ProductType,
    pub featured: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetPrice (absolute).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetPrice {
    pub provider_id: ProviderId,
    pub product_id: ProductId,
    pub price_cents: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AdjustPricePercent (relative, round-half-up, floored at zero).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustPricePercent {
    pub provider_id: ProviderId,
    pub product_id: ProductId,
    pub percent: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetStock (absolute, replaces the counter).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetStock {
    pub provider_id: ProviderId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AdjustStock (relative increment/decrement).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustStock {
    pub provider_id: ProviderId,
    pub product_id: ProductId,
    pub direction: StockDirection,
    pub amount: i64,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ToggleFeatured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleFeatured {
    pub provider_id: ProviderId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ToggleActive (soft delete / relist; rows are never removed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleActive {
    pub provider_id: ProviderId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductCommand {
    ListProduct(ListProduct),
    SetPrice(SetPrice),
    AdjustPricePercent(AdjustPricePercent),
    SetStock(SetStock),
    AdjustStock(AdjustStock),
    ToggleFeatured(ToggleFeatured),
    ToggleActive(ToggleActive),
}

/// Event: ProductListed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductListed {
    pub product_id: ProductId,
    pub provider_id: ProviderId,
    pub album_id: AlbumId,
    pub price_cents: u64,
    /// Already normalized for digital products.
    pub stock: i64,
    pub product_type: ProductType,
    pub featured: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PriceChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceChanged {
    pub product_id: ProductId,
    pub price_cents: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockSet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockSet {
    pub product_id: ProductId,
    /// Already normalized for digital products.
    pub quantity: i64,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockAdjusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjusted {
    pub product_id: ProductId,
    pub delta: i64,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: FeaturedToggled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeaturedToggled {
    pub product_id: ProductId,
    pub featured: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ActiveToggled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveToggled {
    pub product_id: ProductId,
    pub active: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductEvent {
    ProductListed(ProductListed),
    PriceChanged(PriceChanged),
    StockSet(StockSet),
    StockAdjusted(StockAdjusted),
    FeaturedToggled(FeaturedToggled),
    ActiveToggled(ActiveToggled),
}

impl Event for ProductEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::ProductListed(_) => "catalog.product.listed",
            ProductEvent::PriceChanged(_) => "catalog.product.price_changed",
            ProductEvent::StockSet(_) => "catalog.product.stock_set",
            ProductEvent::StockAdjusted(_) => "catalog.product.stock_adjusted",
            ProductEvent::FeaturedToggled(_) => "catalog.product.featured_toggled",
            ProductEvent::ActiveToggled(_) => "catalog.product.active_toggled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ProductEvent::ProductListed(e) => e.occurred_at,
            ProductEvent::PriceChanged(e) => e.occurred_at,
            ProductEvent::StockSet(e) => e.occurred_at,
            ProductEvent::StockAdjusted(e) => e.occurred_at,
            ProductEvent::FeaturedToggled(e) => e.occurred_at,
            ProductEvent::ActiveToggled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Product {
    type Command = ProductCommand;
    type Event = ProductEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ProductEvent::ProductListed(e) => {
                self.id = e.product_id;
                self.provider_id = Some(e.provider_id);
                self.album_id = Some(e.album_id);
                self.price_cents = e.price_cents;
                self.stock = e.stock;
                self.product_type = e.product_type;
                self.active = true;
                self.featured = e.featured;
                self.created = true;
            }
            ProductEvent::PriceChanged(e) => {
                self.price_cents = e.price_cents;
            }
            ProductEvent::StockSet(e) => {
                self.stock = e.quantity;
            }
            ProductEvent::StockAdjusted(e) => {
                self.stock += e.delta;
            }
            ProductEvent::FeaturedToggled(e) => {
                self.featured = e.featured;
            }
            ProductEvent::ActiveToggled(e) => {
                self.active = e.active;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ProductCommand::ListProduct(cmd) => self.handle_list(cmd),
            ProductCommand::SetPrice(cmd) => self.handle_set_price(cmd),
            ProductCommand::AdjustPricePercent(cmd) => self.handle_adjust_price_percent(cmd),
            ProductCommand::SetStock(cmd) => self.handle_set_stock(cmd),
            ProductCommand::AdjustStock(cmd) => self.handle_adjust_stock(cmd),
            ProductCommand::ToggleFeatured(cmd) => self.handle_toggle_featured(cmd),
            ProductCommand::ToggleActive(cmd) => self.handle_toggle_active(cmd),
        }
    }
}

impl Product {
    fn ensure_owner(&self, provider_id: ProviderId) -> Result<(), DomainError> {
        if self.provider_id != Some(provider_id) {
            return Err(DomainError::forbidden());
        }
        Ok(())
    }

    fn ensure_product_id(&self, product_id: ProductId) -> Result<(), DomainError> {
        if self.id != product_id {
            return Err(DomainError::invalid_id("product_id mismatch".to_string()));
        }
        Ok(())
    }

    fn ensure_exists(&self, product_id: ProductId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_product_id(product_id)
    }

    fn handle_list(&self, cmd: &ListProduct) -> Result<Vec<ProductEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("product already listed"));
        }

        if cmd.price_cents == 0 {
            return Err(DomainError::invalid_argument("price must be positive"));
        }

        if cmd.stock < 0 {
            return Err(DomainError::invalid_argument("stock cannot be negative"));
        }

        Ok(vec![ProductEvent::ProductListed(ProductListed {
            product_id: cmd.product_id,
            provider_id: cmd.provider_id,
            album_id: cmd.album_id,
            price_cents: cmd.price_cents,
            stock: normalized_stock(cmd.product_type, cmd.stock),
            product_type: cmd.product_type,
            featured: cmd.featured,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_set_price(&self, cmd: &SetPrice) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_exists(cmd.product_id)?;
        self.ensure_owner(cmd.provider_id)?;

        if cmd.price_cents == 0 {
            return Err(DomainError::invalid_argument("price must be positive"));
        }

        Ok(vec![ProductEvent::PriceChanged(PriceChanged {
            product_id: cmd.product_id,
            price_cents: cmd.price_cents,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_adjust_price_percent(
        &self,
        cmd: &AdjustPricePercent,
    ) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_exists(cmd.product_id)?;
        self.ensure_owner(cmd.provider_id)?;

        Ok(vec![ProductEvent::PriceChanged(PriceChanged {
            product_id: cmd.product_id,
            price_cents: money::apply_percent(self.price_cents, cmd.percent),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_set_stock(&self, cmd: &SetStock) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_exists(cmd.product_id)?;
        self.ensure_owner(cmd.provider_id)?;

        if !self.active {
            return Err(DomainError::invalid_state("product is not active"));
        }

        if cmd.quantity < 0 {
            return Err(DomainError::invalid_argument("stock cannot be negative"));
        }

        Ok(vec![ProductEvent::StockSet(StockSet {
            product_id: cmd.product_id,
            quantity: normalized_stock(self.product_type, cmd.quantity),
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_adjust_stock(&self, cmd: &AdjustStock) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_exists(cmd.product_id)?;
        self.ensure_owner(cmd.provider_id)?;

        if cmd.amount <= 0 {
            return Err(DomainError::invalid_argument("amount must be positive"));
        }

        let delta = match cmd.direction {
            StockDirection::Increment => cmd.amount,
            StockDirection::Decrement => {
                // All-or-nothing: no partial decrement, no floor-at-zero clamping.
                if self.stock - cmd.amount < 0 {
                    return Err(DomainError::invalid_argument("insufficient stock"));
                }
                -cmd.amount
            }
        };

        Ok(vec![ProductEvent::StockAdjusted(StockAdjusted {
            product_id: cmd.product_id,
            delta,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_toggle_featured(&self, cmd: &ToggleFeatured) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_exists(cmd.product_id)?;
        self.ensure_owner(cmd.provider_id)?;

        Ok(vec![ProductEvent::FeaturedToggled(FeaturedToggled {
            product_id: cmd.product_id,
            featured: !self.featured,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_toggle_active(&self, cmd: &ToggleActive) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_exists(cmd.product_id)?;
        self.ensure_owner(cmd.provider_id)?;

        Ok(vec![ProductEvent::ActiveToggled(ActiveToggled {
            product_id: cmd.product_id,
            active: !self.active,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use waxmarket_core::AggregateId;

    fn test_provider_id() -> ProviderId {
        ProviderId::new()
    }

    fn test_product_id() -> ProductId {
        ProductId::new(AggregateId::new())
    }

    fn test_album_id() -> AlbumId {
        AlbumId::new()
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn listed_product(
        provider_id: ProviderId,
        product_id: ProductId,
        product_type: ProductType,
        price_cents: u64,
        stock: i64,
    ) -> Product {
        let mut product = Product::empty(product_id);
        let cmd = ListProduct {
            provider_id,
            product_id,
            album_id: test_album_id(),
            price_cents,
            stock,
            product_type,
            featured: false,
            occurred_at: test_time(),
        };
        let events = product.handle(&ProductCommand::ListProduct(cmd)).unwrap();
        product.apply(&events[0]);
        product
    }

    #[test]
    fn list_product_emits_product_listed_event() {
        let product = Product::empty(test_product_id());
        let provider_id = test_provider_id();
        let product_id = test_product_id();
        let album_id = test_album_id();
        let cmd = ListProduct {
            provider_id,
            product_id,
            album_id,
            price_cents: 1500,
            stock: 10,
            product_type: ProductType::Physical,
            featured: false,
            occurred_at: test_time(),
        };

        let events = product.handle(&ProductCommand::ListProduct(cmd)).unwrap();
        assert_eq!(events.len(), 1);

        match &events[0] {
            ProductEvent::ProductListed(e) => {
                assert_eq!(e.provider_id, provider_id);
                assert_eq!(e.album_id, album_id);
                assert_eq!(e.price_cents, 1500);
                assert_eq!(e.stock, 10);
            }
            _ => panic!("Expected ProductListed event"),
        }
    }

    #[test]
    fn list_product_rejects_zero_price() {
        let product = Product::empty(test_product_id());
        let cmd = ListProduct {
            provider_id: test_provider_id(),
            product_id: test_product_id(),
            album_id: test_album_id(),
            price_cents: 0,
            stock: 10,
            product_type: ProductType::Physical,
            featured: false,
            occurred_at: test_time(),
        };

        let err = product
            .handle(&ProductCommand::ListProduct(cmd))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidArgument(_)));
    }

    #[test]
    fn digital_listing_below_threshold_gets_sentinel_stock() {
        let product = listed_product(
            test_provider_id(),
            test_product_id(),
            ProductType::Digital,
            999,
            5,
        );
        assert_eq!(product.stock(), DIGITAL_STOCK_SENTINEL);
    }

    #[test]
    fn digital_listing_at_threshold_is_kept() {
        let product = listed_product(
            test_provider_id(),
            test_product_id(),
            ProductType::Digital,
            999,
            DIGITAL_STOCK_THRESHOLD,
        );
        assert_eq!(product.stock(), DIGITAL_STOCK_THRESHOLD);
    }

    #[test]
    fn physical_listing_keeps_declared_stock() {
        let product = listed_product(
            test_provider_id(),
            test_product_id(),
            ProductType::Physical,
            999,
            5,
        );
        assert_eq!(product.stock(), 5);
    }

    #[test]
    fn set_stock_replaces_counter_and_is_idempotent() {
        let provider_id = test_provider_id();
        let product_id = test_product_id();
        let mut product =
            listed_product(provider_id, product_id, ProductType::Physical, 1000, 20);

        let cmd = SetStock {
            provider_id,
            product_id,
            quantity: 7,
            reason: None,
            occurred_at: test_time(),
        };

        let events = product
            .handle(&ProductCommand::SetStock(cmd.clone()))
            .unwrap();
        product.apply(&events[0]);
        assert_eq!(product.stock(), 7);

        // A second identical set is not an increment.
        let events = product.handle(&ProductCommand::SetStock(cmd)).unwrap();
        product.apply(&events[0]);
        assert_eq!(product.stock(), 7);
    }

    #[test]
    fn set_stock_rejects_negative_quantity() {
        let provider_id = test_provider_id();
        let product_id = test_product_id();
        let product = listed_product(provider_id, product_id, ProductType::Physical, 1000, 20);

        let cmd = SetStock {
            provider_id,
            product_id,
            quantity: -1,
            reason: None,
            occurred_at: test_time(),
        };

        let err = product.handle(&ProductCommand::SetStock(cmd)).unwrap_err();
        assert!(matches!(err, DomainError::InvalidArgument(_)));
        assert_eq!(product.stock(), 20);
    }

    #[test]
    fn set_stock_rejects_inactive_product() {
        let provider_id = test_provider_id();
        let product_id = test_product_id();
        let mut product =
            listed_product(provider_id, product_id, ProductType::Physical, 1000, 20);

        let toggle = ToggleActive {
            provider_id,
            product_id,
            occurred_at: test_time(),
        };
        let events = product.handle(&ProductCommand::ToggleActive(toggle)).unwrap();
        product.apply(&events[0]);
        assert!(!product.is_active());

        let cmd = SetStock {
            provider_id,
            product_id,
            quantity: 3,
            reason: None,
            occurred_at: test_time(),
        };
        let err = product.handle(&ProductCommand::SetStock(cmd)).unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
    }

    #[test]
    fn set_stock_on_digital_normalizes_low_values() {
        let provider_id = test_provider_id();
        let product_id = test_product_id();
        let mut product =
            listed_product(provider_id, product_id, ProductType::Digital, 1000, 5000);

        let cmd = SetStock {
            provider_id,
            product_id,
            quantity: 5,
            reason: Some("restock".to_string()),
            occurred_at: test_time(),
        };
        let events = product.handle(&ProductCommand::SetStock(cmd)).unwrap();
        product.apply(&events[0]);
        assert_eq!(product.stock(), DIGITAL_STOCK_SENTINEL);
    }

    #[test]
    fn increment_adds_unconditionally() {
        let provider_id = test_provider_id();
        let product_id = test_product_id();
        let mut product = listed_product(provider_id, product_id, ProductType::Physical, 1000, 2);

        let cmd = AdjustStock {
            provider_id,
            product_id,
            direction: StockDirection::Increment,
            amount: 3,
            reason: None,
            occurred_at: test_time(),
        };
        let events = product.handle(&ProductCommand::AdjustStock(cmd)).unwrap();
        product.apply(&events[0]);
        assert_eq!(product.stock(), 5);
    }

    #[test]
    fn decrement_beyond_stock_fails_and_leaves_stock_unchanged() {
        let provider_id = test_provider_id();
        let product_id = test_product_id();
        let product = listed_product(provider_id, product_id, ProductType::Physical, 1000, 2);

        let cmd = AdjustStock {
            provider_id,
            product_id,
            direction: StockDirection::Decrement,
            amount: 3,
            reason: None,
            occurred_at: test_time(),
        };
        let err = product
            .handle(&ProductCommand::AdjustStock(cmd))
            .unwrap_err();
        match err {
            DomainError::InvalidArgument(msg) => assert!(msg.contains("insufficient stock")),
            other => panic!("Expected InvalidArgument, got {other:?}"),
        }
        assert_eq!(product.stock(), 2);
    }

    #[test]
    fn decrement_to_exactly_zero_is_allowed() {
        let provider_id = test_provider_id();
        let product_id = test_product_id();
        let mut product = listed_product(provider_id, product_id, ProductType::Physical, 1000, 2);

        let cmd = AdjustStock {
            provider_id,
            product_id,
            direction: StockDirection::Decrement,
            amount: 2,
            reason: None,
            occurred_at: test_time(),
        };
        let events = product.handle(&ProductCommand::AdjustStock(cmd)).unwrap();
        product.apply(&events[0]);
        assert_eq!(product.stock(), 0);
        assert_eq!(product.availability(), Availability::OutOfStock);
    }

    #[test]
    fn adjust_rejects_non_positive_amount() {
        let provider_id = test_provider_id();
        let product_id = test_product_id();
        let product = listed_product(provider_id, product_id, ProductType::Physical, 1000, 2);

        let cmd = AdjustStock {
            provider_id,
            product_id,
            direction: StockDirection::Increment,
            amount: 0,
            reason: None,
            occurred_at: test_time(),
        };
        let err = product
            .handle(&ProductCommand::AdjustStock(cmd))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidArgument(_)));
    }

    #[test]
    fn foreign_provider_is_forbidden() {
        let owner = test_provider_id();
        let intruder = test_provider_id();
        let product_id = test_product_id();
        let product = listed_product(owner, product_id, ProductType::Physical, 1000, 10);

        let set = SetStock {
            provider_id: intruder,
            product_id,
            quantity: 0,
            reason: None,
            occurred_at: test_time(),
        };
        assert_eq!(
            product.handle(&ProductCommand::SetStock(set)).unwrap_err(),
            DomainError::Forbidden
        );

        let adjust = AdjustStock {
            provider_id: intruder,
            product_id,
            direction: StockDirection::Decrement,
            amount: 1,
            reason: None,
            occurred_at: test_time(),
        };
        assert_eq!(
            product
                .handle(&ProductCommand::AdjustStock(adjust))
                .unwrap_err(),
            DomainError::Forbidden
        );
        assert_eq!(product.stock(), 10);
    }

    #[test]
    fn set_price_rejects_zero() {
        let provider_id = test_provider_id();
        let product_id = test_product_id();
        let product = listed_product(provider_id, product_id, ProductType::Physical, 1000, 10);

        let cmd = SetPrice {
            provider_id,
            product_id,
            price_cents: 0,
            occurred_at: test_time(),
        };
        let err = product.handle(&ProductCommand::SetPrice(cmd)).unwrap_err();
        assert!(matches!(err, DomainError::InvalidArgument(_)));
    }

    #[test]
    fn percent_adjustment_rounds_half_up() {
        let provider_id = test_provider_id();
        let product_id = test_product_id();
        // 150 cents + 1% = 151.5 -> 152
        let mut product = listed_product(provider_id, product_id, ProductType::Physical, 150, 10);

        let cmd = AdjustPricePercent {
            provider_id,
            product_id,
            percent: 1,
            occurred_at: test_time(),
        };
        let events = product
            .handle(&ProductCommand::AdjustPricePercent(cmd))
            .unwrap();
        product.apply(&events[0]);
        assert_eq!(product.price_cents(), 152);
    }

    #[test]
    fn percent_decrease_floors_at_zero() {
        let provider_id = test_provider_id();
        let product_id = test_product_id();
        let mut product = listed_product(provider_id, product_id, ProductType::Physical, 500, 10);

        let cmd = AdjustPricePercent {
            provider_id,
            product_id,
            percent: -150,
            occurred_at: test_time(),
        };
        let events = product
            .handle(&ProductCommand::AdjustPricePercent(cmd))
            .unwrap();
        product.apply(&events[0]);
        assert_eq!(product.price_cents(), 0);
    }

    #[test]
    fn toggle_active_flips_and_preserves_history() {
        let provider_id = test_provider_id();
        let product_id = test_product_id();
        let mut product =
            listed_product(provider_id, product_id, ProductType::Physical, 1000, 10);
        assert!(product.is_active());

        let cmd = ToggleActive {
            provider_id,
            product_id,
            occurred_at: test_time(),
        };
        let events = product
            .handle(&ProductCommand::ToggleActive(cmd.clone()))
            .unwrap();
        product.apply(&events[0]);
        assert!(!product.is_active());
        // Soft delete: the aggregate still exists and is queryable.
        assert!(product.exists());
        assert_eq!(product.stock(), 10);

        let events = product.handle(&ProductCommand::ToggleActive(cmd)).unwrap();
        product.apply(&events[0]);
        assert!(product.is_active());
    }

    #[test]
    fn toggle_featured_flips() {
        let provider_id = test_provider_id();
        let product_id = test_product_id();
        let mut product =
            listed_product(provider_id, product_id, ProductType::Physical, 1000, 10);
        assert!(!product.is_featured());

        let cmd = ToggleFeatured {
            provider_id,
            product_id,
            occurred_at: test_time(),
        };
        let events = product
            .handle(&ProductCommand::ToggleFeatured(cmd))
            .unwrap();
        product.apply(&events[0]);
        assert!(product.is_featured());
    }

    #[test]
    fn operations_on_unlisted_product_are_not_found() {
        let product = Product::empty(test_product_id());
        let cmd = AdjustStock {
            provider_id: test_provider_id(),
            product_id: test_product_id(),
            direction: StockDirection::Increment,
            amount: 1,
            reason: None,
            occurred_at: test_time(),
        };
        assert_eq!(
            product
                .handle(&ProductCommand::AdjustStock(cmd))
                .unwrap_err(),
            DomainError::NotFound
        );
    }

    #[test]
    fn availability_thresholds() {
        assert_eq!(Availability::from_stock(0), Availability::OutOfStock);
        assert_eq!(Availability::from_stock(1), Availability::LowStock);
        assert_eq!(
            Availability::from_stock(LOW_STOCK_THRESHOLD),
            Availability::LowStock
        );
        assert_eq!(
            Availability::from_stock(LOW_STOCK_THRESHOLD + 1),
            Availability::InStock
        );
    }

    #[test]
    fn handle_does_not_mutate_state() {
        let provider_id = test_provider_id();
        let product_id = test_product_id();
        let product = listed_product(provider_id, product_id, ProductType::Physical, 1000, 10);

        let cmd = AdjustStock {
            provider_id,
            product_id,
            direction: StockDirection::Decrement,
            amount: 4,
            reason: None,
            occurred_at: test_time(),
        };

        let before = product.clone();
        let events1 = product
            .handle(&ProductCommand::AdjustStock(cmd.clone()))
            .unwrap();
        let events2 = product.handle(&ProductCommand::AdjustStock(cmd)).unwrap();

        assert_eq!(product, before);
        assert_eq!(events1, events2);
    }

    #[cfg(test)]
    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum StockOp {
            Set(i64),
            Increment(i64),
            Decrement(i64),
        }

        fn stock_op() -> impl Strategy<Value = StockOp> {
            prop_oneof![
                (0i64..10_000).prop_map(StockOp::Set),
                (1i64..500).prop_map(StockOp::Increment),
                (1i64..500).prop_map(StockOp::Decrement),
            ]
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 500,
                ..ProptestConfig::default()
            })]

            /// Property: stock never goes negative, whatever sequence of
            /// ledger operations is attempted (failed ops leave state alone).
            #[test]
            fn stock_is_never_negative(ops in proptest::collection::vec(stock_op(), 1..40)) {
                let provider_id = test_provider_id();
                let product_id = test_product_id();
                let mut product =
                    listed_product(provider_id, product_id, ProductType::Physical, 1000, 0);

                for op in ops {
                    let cmd = match op {
                        StockOp::Set(q) => ProductCommand::SetStock(SetStock {
                            provider_id,
                            product_id,
                            quantity: q,
                            reason: None,
                            occurred_at: test_time(),
                        }),
                        StockOp::Increment(a) => ProductCommand::AdjustStock(AdjustStock {
                            provider_id,
                            product_id,
                            direction: StockDirection::Increment,
                            amount: a,
                            reason: None,
                            occurred_at: test_time(),
                        }),
                        StockOp::Decrement(a) => ProductCommand::AdjustStock(AdjustStock {
                            provider_id,
                            product_id,
                            direction: StockDirection::Decrement,
                            amount: a,
                            reason: None,
                            occurred_at: test_time(),
                        }),
                    };

                    if let Ok(events) = product.handle(&cmd) {
                        for event in &events {
                            product.apply(event);
                        }
                    }

                    prop_assert!(product.stock() >= 0);
                }
            }

            /// Property: percentage price adjustments never underflow.
            #[test]
            fn percent_adjustments_never_underflow(
                price in 1u64..1_000_000,
                percent in -300i64..300,
            ) {
                let provider_id = test_provider_id();
                let product_id = test_product_id();
                let mut product =
                    listed_product(provider_id, product_id, ProductType::Physical, price, 1);

                let cmd = AdjustPricePercent {
                    provider_id,
                    product_id,
                    percent,
                    occurred_at: test_time(),
                };
                let events = product
                    .handle(&ProductCommand::AdjustPricePercent(cmd))
                    .unwrap();
                product.apply(&events[0]);

                // u64 by construction; the floor keeps decreases at zero.
                if percent <= -100 {
                    prop_assert_eq!(product.price_cents(), 0);
                }
            }
        }
    }
}
