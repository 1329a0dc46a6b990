//! Coupon registry

use jiff::{SignedDuration, Timestamp};
use rust_decimal::Decimal;
use rusty_money::{Money, iso::Currency};
use tracing::{debug, info, warn};

use crate::{
    coupons::{
        Coupon, CouponError, CouponRecord, CouponRejection, CouponUpdate, CouponUuid, NewCoupon,
        check_definition, normalize_code, validate_code,
    },
    discounts::CouponDiscount,
    prices::Price,
    storage::{COUPONS_STORAGE_KEY, KeyValueStore, Loaded, load_document, save_document},
};

/// Validity window of the coupon seeded into an empty registry.
const WELCOME_COUPON_VALIDITY: SignedDuration = SignedDuration::from_hours(30 * 24);

/// Owns coupon definitions and their redemption counters, mirrored to storage.
#[derive(Debug)]
pub struct CouponRegistry<S: KeyValueStore> {
    store: S,
    coupons: Vec<Coupon>,
}

impl<S: KeyValueStore> CouponRegistry<S> {
    /// Load the registry from `store`.
    ///
    /// An empty store is seeded with the welcome coupon; unreadable data leaves
    /// the registry empty.
    pub fn init(store: S, currency: &'static Currency) -> Self {
        Self::init_at(store, currency, Timestamp::now())
    }

    /// Like [`CouponRegistry::init`], seeding relative to `now`.
    pub fn init_at(store: S, currency: &'static Currency, now: Timestamp) -> Self {
        let mut registry = Self {
            store,
            coupons: Vec::new(),
        };

        match load_document::<Vec<CouponRecord>, _>(&registry.store, COUPONS_STORAGE_KEY) {
            Loaded::Found(records) => {
                registry.coupons = records
                    .into_iter()
                    .filter_map(|record| {
                        let code = record.code.clone();

                        Coupon::try_from(record)
                            .inspect_err(|error| warn!(%code, %error, "skipping stored coupon"))
                            .ok()
                    })
                    .collect();

                debug!(count = registry.coupons.len(), "loaded coupons");
            }
            Loaded::Missing => {
                registry.coupons = vec![welcome_coupon(currency, now)];
                registry.persist();

                info!("seeded coupon registry with the welcome coupon");
            }
            Loaded::Unreadable => {}
        }

        registry
    }

    /// All coupons, in creation order.
    pub fn list(&self) -> &[Coupon] {
        &self.coupons
    }

    /// Coupon by id.
    pub fn get(&self, uuid: CouponUuid) -> Option<&Coupon> {
        self.coupons.iter().find(|coupon| coupon.uuid == uuid)
    }

    /// Coupon by code, ignoring case.
    pub fn find_by_code(&self, code: &str) -> Option<&Coupon> {
        self.coupons.iter().find(|coupon| coupon.matches_code(code))
    }

    /// Validate `code` for a cart with the given pre-discount subtotal.
    ///
    /// # Errors
    ///
    /// Returns the first [`CouponRejection`] that applies.
    pub fn validate(&self, code: &str, subtotal: Price) -> Result<&Coupon, CouponRejection> {
        self.validate_at(code, subtotal, Timestamp::now())
    }

    /// Like [`CouponRegistry::validate`], at instant `now`.
    ///
    /// # Errors
    ///
    /// Returns the first [`CouponRejection`] that applies.
    pub fn validate_at(
        &self,
        code: &str,
        subtotal: Price,
        now: Timestamp,
    ) -> Result<&Coupon, CouponRejection> {
        validate_code(&self.coupons, code, subtotal, now)
    }

    /// Discount `coupon` grants on `subtotal`.
    pub fn compute_discount(coupon: &Coupon, subtotal: Price) -> Price {
        coupon.discount_for(subtotal)
    }

    /// Consume one use of the coupon. Must run exactly once per completed
    /// checkout and never while previewing a discount.
    ///
    /// # Errors
    ///
    /// Returns [`CouponError::NotFound`] for an unknown id and
    /// [`CouponError::Exhausted`] when no uses are left.
    pub fn record_redemption(&mut self, uuid: CouponUuid) -> Result<&Coupon, CouponError> {
        let idx = self.index_of(uuid)?;

        let coupon = self
            .coupons
            .get_mut(idx)
            .ok_or(CouponError::NotFound(uuid))?;

        if coupon.is_exhausted() {
            return Err(CouponError::Exhausted(uuid));
        }

        coupon.usage_count += 1;
        coupon.updated_at = Timestamp::now();

        info!(
            code = %coupon.code,
            usage_count = coupon.usage_count,
            usage_limit = coupon.usage_limit,
            "coupon redeemed"
        );

        self.persist();

        self.get(uuid).ok_or(CouponError::NotFound(uuid))
    }

    /// Create a coupon.
    ///
    /// # Errors
    ///
    /// Returns [`CouponError::DuplicateCode`] if the code is taken, or
    /// [`CouponError::InvalidDefinition`] if the coupon breaks a rule.
    pub fn add_coupon(&mut self, new: NewCoupon) -> Result<&Coupon, CouponError> {
        let now = Timestamp::now();

        let coupon = Coupon {
            uuid: CouponUuid::new_v4(),
            code: new.code.trim().to_string(),
            description: new.description,
            discount: new.discount,
            min_purchase: new.min_purchase,
            starts_at: new.starts_at,
            ends_at: new.ends_at,
            usage_limit: new.usage_limit,
            usage_count: 0,
            is_active: new.is_active,
            created_at: now,
            updated_at: now,
        };

        check_definition(&coupon)?;
        self.ensure_code_free(&coupon.code, None)?;

        debug!(code = %coupon.code, "coupon created");

        let uuid = coupon.uuid;
        self.coupons.push(coupon);
        self.persist();

        self.get(uuid).ok_or(CouponError::NotFound(uuid))
    }

    /// Apply a partial update to a coupon.
    ///
    /// # Errors
    ///
    /// Returns [`CouponError::NotFound`], [`CouponError::DuplicateCode`] or
    /// [`CouponError::InvalidDefinition`]. A rejected update changes nothing.
    pub fn update_coupon(
        &mut self,
        uuid: CouponUuid,
        update: CouponUpdate,
    ) -> Result<&Coupon, CouponError> {
        let idx = self.index_of(uuid)?;
        let mut coupon = self
            .coupons
            .get(idx)
            .cloned()
            .ok_or(CouponError::NotFound(uuid))?;

        if let Some(code) = update.code {
            coupon.code = code.trim().to_string();
        }
        if let Some(description) = update.description {
            coupon.description = description;
        }
        if let Some(discount) = update.discount {
            coupon.discount = discount;
        }
        if let Some(min_purchase) = update.min_purchase {
            coupon.min_purchase = min_purchase;
        }
        if let Some(starts_at) = update.starts_at {
            coupon.starts_at = starts_at;
        }
        if let Some(ends_at) = update.ends_at {
            coupon.ends_at = ends_at;
        }
        if let Some(usage_limit) = update.usage_limit {
            coupon.usage_limit = usage_limit;
        }
        if let Some(is_active) = update.is_active {
            coupon.is_active = is_active;
        }

        check_definition(&coupon)?;
        self.ensure_code_free(&coupon.code, Some(uuid))?;

        coupon.updated_at = Timestamp::now();

        if let Some(slot) = self.coupons.get_mut(idx) {
            *slot = coupon;
        }

        self.persist();

        self.get(uuid).ok_or(CouponError::NotFound(uuid))
    }

    /// Switch a coupon on or off.
    ///
    /// # Errors
    ///
    /// Returns [`CouponError::NotFound`] for an unknown id.
    pub fn set_active(&mut self, uuid: CouponUuid, is_active: bool) -> Result<&Coupon, CouponError> {
        self.update_coupon(
            uuid,
            CouponUpdate {
                is_active: Some(is_active),
                ..CouponUpdate::default()
            },
        )
    }

    /// Delete a coupon, returning it.
    ///
    /// # Errors
    ///
    /// Returns [`CouponError::NotFound`] for an unknown id.
    pub fn delete_coupon(&mut self, uuid: CouponUuid) -> Result<Coupon, CouponError> {
        let idx = self.index_of(uuid)?;
        let removed = self.coupons.remove(idx);

        debug!(code = %removed.code, "coupon deleted");

        self.persist();

        Ok(removed)
    }

    fn index_of(&self, uuid: CouponUuid) -> Result<usize, CouponError> {
        self.coupons
            .iter()
            .position(|coupon| coupon.uuid == uuid)
            .ok_or(CouponError::NotFound(uuid))
    }

    fn ensure_code_free(&self, code: &str, except: Option<CouponUuid>) -> Result<(), CouponError> {
        let wanted = normalize_code(code);

        let taken = self
            .coupons
            .iter()
            .filter(|coupon| Some(coupon.uuid) != except)
            .any(|coupon| normalize_code(&coupon.code) == wanted);

        if taken {
            Err(CouponError::DuplicateCode(code.to_string()))
        } else {
            Ok(())
        }
    }

    fn persist(&mut self) {
        let records: Vec<CouponRecord> = self.coupons.iter().map(CouponRecord::from).collect();

        save_document(&mut self.store, COUPONS_STORAGE_KEY, &records);
    }
}

/// `BEMVINDO10`: 10% off for new customers, minimum purchase of 100, capped at
/// 50, valid for 30 days from `now` with 100 uses.
pub fn welcome_coupon(currency: &'static Currency, now: Timestamp) -> Coupon {
    Coupon {
        uuid: CouponUuid::new_v4(),
        code: "BEMVINDO10".to_string(),
        description: "10% off for new customers".to_string(),
        discount: CouponDiscount::percentage_points(
            Decimal::TEN,
            Some(Money::from_minor(5_000, currency)),
        ),
        min_purchase: Money::from_minor(10_000, currency),
        starts_at: now,
        ends_at: now
            .checked_add(WELCOME_COUPON_VALIDITY)
            .unwrap_or(Timestamp::MAX),
        usage_limit: 100,
        usage_count: 0,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}
