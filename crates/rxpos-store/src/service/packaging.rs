//! # Packaging Service
//!
//! Catalog and override orchestration: defining hierarchies, layering shop
//! customizations, and producing the merged effective view a POS screen
//! sells from.
//!
//! ## Effective View Assembly
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  effective_packaging("shop-a", "amox-500")                              │
//! │       │                                                                 │
//! │       ├── DrugCatalog.get_packaging     → global hierarchy              │
//! │       ├── OverrideRepository.get_set    → shop's customizations         │
//! │       ├── InventoryRepository.get       → shop's price book (optional)  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  rxpos_core::resolve_effective_packaging(catalog, overrides, pricing)   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use tracing::{debug, info};

use rxpos_core::overrides::ShopPackagingOverride;
use rxpos_core::packaging::PackagingInfo;
use rxpos_core::resolve::{resolve_effective_packaging, EffectivePackagingLevel};

use crate::error::{StoreError, StoreResult};
use crate::repository::{BarcodeHit, DrugCatalog, InventoryRepository, OverrideRepository};

/// Orchestrates the packaging catalog, per-shop overrides, and the merged
/// effective view.
pub struct PackagingService<C, O, I> {
    catalog: Arc<C>,
    overrides: Arc<O>,
    inventories: Arc<I>,
}

impl<C, O, I> PackagingService<C, O, I>
where
    C: DrugCatalog,
    O: OverrideRepository,
    I: InventoryRepository,
{
    pub fn new(catalog: Arc<C>, overrides: Arc<O>, inventories: Arc<I>) -> Self {
        PackagingService {
            catalog,
            overrides,
            inventories,
        }
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    /// Creates or replaces a drug's global packaging hierarchy.
    pub async fn define_packaging(&self, info: PackagingInfo) -> StoreResult<()> {
        info!(drug_id = %info.drug_id, levels = info.levels.len(), "Defining packaging");
        self.catalog.save_packaging(info).await
    }

    /// Fetches a drug's global hierarchy.
    pub async fn get_packaging(&self, drug_id: &str) -> StoreResult<PackagingInfo> {
        self.catalog
            .get_packaging(drug_id)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                entity: "packaging",
                id: drug_id.to_string(),
            })
    }

    /// Converts a quantity between two of a drug's units.
    pub async fn convert_quantity(
        &self,
        drug_id: &str,
        quantity: f64,
        from_unit: &str,
        to_unit: &str,
    ) -> StoreResult<f64> {
        let info = self.get_packaging(drug_id).await?;
        Ok(info.convert_quantity(quantity, from_unit, to_unit)?)
    }

    /// Resolves a scanned barcode to its drug and packaging level.
    pub async fn lookup_barcode(&self, barcode: &str) -> StoreResult<BarcodeHit> {
        self.catalog
            .find_by_barcode(barcode)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                entity: "barcode",
                id: barcode.to_string(),
            })
    }

    // =========================================================================
    // Overrides
    // =========================================================================

    /// Adds a shop override (customize a global level or define a custom
    /// one). When the override is flagged as the default sell unit, the
    /// shop's cached sell unit is updated in the same step.
    pub async fn add_override(
        &self,
        ov: ShopPackagingOverride,
    ) -> StoreResult<ShopPackagingOverride> {
        let catalog = self.get_packaging(&ov.drug_id).await?;
        let mut set = self.overrides.get_set(&ov.shop_id, &ov.drug_id).await?;

        let stored = set.add(ov, &catalog)?.clone();
        debug!(
            shop_id = %set.shop_id,
            drug_id = %set.drug_id,
            override_id = %stored.id,
            custom = stored.is_custom(),
            "Added packaging override"
        );

        // The set must be on disk before the inventory cache points at it.
        self.overrides.save_set(set).await?;
        if stored.is_default_sell_unit {
            if let Some(name) = Self::override_unit_name(&stored, &catalog) {
                self.cache_sell_unit(&stored.shop_id, &stored.drug_id, &name)
                    .await?;
            }
        }
        Ok(stored)
    }

    /// Replaces an existing override's field values.
    pub async fn update_override(&self, ov: ShopPackagingOverride) -> StoreResult<()> {
        let catalog = self.get_packaging(&ov.drug_id).await?;
        let mut set = self.overrides.get_set(&ov.shop_id, &ov.drug_id).await?;

        set.update(ov, &catalog)?;
        self.overrides.save_set(set).await
    }

    /// Flags (or unflags) an override as the shop's default sell unit and
    /// propagates the change into the shop's inventory cache.
    pub async fn set_default_sell_unit(
        &self,
        shop_id: &str,
        drug_id: &str,
        override_id: &str,
        value: bool,
    ) -> StoreResult<String> {
        let catalog = self.get_packaging(drug_id).await?;
        let mut set = self.overrides.get_set(shop_id, drug_id).await?;

        let unit_name = set.set_default_sell_unit(override_id, value, &catalog)?;

        // The set must be on disk before the inventory cache points at it.
        self.overrides.save_set(set).await?;
        if let Some(mut inv) = self.inventories.get(shop_id, drug_id).await? {
            if value {
                inv.set_shop_specific_sell_unit(unit_name.clone());
            } else {
                inv.clear_shop_specific_sell_unit_if(&unit_name);
            }
            self.inventories.save(inv).await?;
        }
        Ok(unit_name)
    }

    /// The shop's override set for a drug (empty when uncustomized).
    pub async fn get_overrides(
        &self,
        shop_id: &str,
        drug_id: &str,
    ) -> StoreResult<rxpos_core::overrides::OverrideSet> {
        self.overrides.get_set(shop_id, drug_id).await
    }

    // =========================================================================
    // Effective View
    // =========================================================================

    /// The merged catalog + override view for one shop and drug, priced
    /// from the shop's price book when one exists.
    pub async fn effective_packaging(
        &self,
        shop_id: &str,
        drug_id: &str,
    ) -> StoreResult<Vec<EffectivePackagingLevel>> {
        let catalog = self.get_packaging(drug_id).await?;
        let set = self.overrides.get_set(shop_id, drug_id).await?;
        let inventory = self.inventories.get(shop_id, drug_id).await?;

        let levels =
            resolve_effective_packaging(&catalog, &set, inventory.as_ref().map(|i| &i.pricing))?;
        Ok(levels)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn override_unit_name(
        ov: &ShopPackagingOverride,
        catalog: &PackagingInfo,
    ) -> Option<String> {
        match (&ov.custom_unit_name, &ov.packaging_level_id) {
            (Some(name), _) => Some(name.clone()),
            (None, Some(level_id)) => {
                catalog.level_by_id(level_id).map(|l| l.unit_name.clone())
            }
            (None, None) => None,
        }
    }

    async fn cache_sell_unit(
        &self,
        shop_id: &str,
        drug_id: &str,
        unit_name: &str,
    ) -> StoreResult<()> {
        if let Some(mut inv) = self.inventories.get(shop_id, drug_id).await? {
            inv.set_shop_specific_sell_unit(unit_name);
            self.inventories.save(inv).await?;
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rxpos_core::inventory::ShopInventory;
    use rxpos_core::money::Money;
    use rxpos_core::packaging::PackagingLevel;
    use rxpos_core::pricing::ShopPricing;
    use rxpos_core::resolve::LevelSource;
    use rxpos_core::types::UnitType;

    use crate::repository::memory::{
        MemoryDrugCatalog, MemoryInventoryRepository, MemoryOverrideRepository,
    };

    fn service() -> PackagingService<
        MemoryDrugCatalog,
        MemoryOverrideRepository,
        MemoryInventoryRepository,
    > {
        PackagingService::new(
            Arc::new(MemoryDrugCatalog::new()),
            Arc::new(MemoryOverrideRepository::new()),
            Arc::new(MemoryInventoryRepository::new()),
        )
    }

    fn amoxicillin() -> PackagingInfo {
        let mut info = PackagingInfo::new("amox-500", UnitType::Count, "tab", "Tablet");
        info.add_level(PackagingLevel::base("Tablet")).unwrap();
        info.add_level(
            PackagingLevel::new("Strip", 2, 10.0).with_barcode("8964000123457"),
        )
        .unwrap();
        info.add_level(PackagingLevel::new("Box", 3, 100.0).as_default())
            .unwrap();
        info
    }

    #[tokio::test]
    async fn test_define_and_fetch_packaging() {
        let svc = service();
        svc.define_packaging(amoxicillin()).await.unwrap();

        let info = svc.get_packaging("amox-500").await.unwrap();
        assert_eq!(info.levels.len(), 3);

        let tablets = svc
            .convert_quantity("amox-500", 3.0, "Strip", "Tablet")
            .await
            .unwrap();
        assert_eq!(tablets, 30.0);
    }

    #[tokio::test]
    async fn test_define_rejects_invalid_hierarchy() {
        let svc = service();
        let mut info = PackagingInfo::new("bad-drug", UnitType::Count, "tab", "Tablet");
        info.add_level(PackagingLevel::base("Tablet")).unwrap();
        // Corrupt the hierarchy behind the builder's back.
        info.levels[0].base_unit_quantity = -1.0;

        let err = svc.define_packaging(info).await.unwrap_err();
        assert!(matches!(err, StoreError::Core(_)));
        assert!(matches!(
            svc.get_packaging("bad-drug").await.unwrap_err(),
            StoreError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn test_barcode_lookup() {
        let svc = service();
        svc.define_packaging(amoxicillin()).await.unwrap();

        let hit = svc.lookup_barcode("8964000123457").await.unwrap();
        assert_eq!(hit.drug_id, "amox-500");
        assert_eq!(hit.unit_name, "Strip");

        assert!(matches!(
            svc.lookup_barcode("0000000000000").await.unwrap_err(),
            StoreError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn test_override_default_propagates_to_inventory() {
        let svc = service();
        svc.define_packaging(amoxicillin()).await.unwrap();

        let mut inv = ShopInventory::new("shop-a", "amox-500");
        inv.update_pricing(ShopPricing::new(
            Money::from_cents(1500),
            Money::from_cents(2499),
        ));
        svc.inventories.save(inv).await.unwrap();

        let catalog = svc.get_packaging("amox-500").await.unwrap();
        let strip_id = catalog.level_by_name("Strip").unwrap().id.clone();

        let stored = svc
            .add_override(
                ShopPackagingOverride::global("shop-a", "amox-500", &strip_id)
                    .with_price(Money::from_cents(299))
                    .as_default(),
            )
            .await
            .unwrap();
        assert!(stored.is_default_sell_unit);

        let inv = svc
            .inventories
            .get("shop-a", "amox-500")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(inv.shop_specific_sell_unit.as_deref(), Some("Strip"));
    }

    #[tokio::test]
    async fn test_effective_view_merges_all_three_sources() {
        let svc = service();
        svc.define_packaging(amoxicillin()).await.unwrap();

        let mut inv = ShopInventory::new("shop-a", "amox-500");
        inv.update_pricing(ShopPricing::new(
            Money::from_cents(1500),
            Money::from_cents(2499),
        ));
        svc.inventories.save(inv).await.unwrap();

        let catalog = svc.get_packaging("amox-500").await.unwrap();
        let strip_id = catalog.level_by_name("Strip").unwrap().id.clone();
        svc.add_override(
            ShopPackagingOverride::global("shop-a", "amox-500", &strip_id)
                .with_price(Money::from_cents(299))
                .as_default(),
        )
        .await
        .unwrap();

        let levels = svc.effective_packaging("shop-a", "amox-500").await.unwrap();
        assert_eq!(levels.len(), 3);

        let strip = levels.iter().find(|l| l.unit_name == "Strip").unwrap();
        assert!(matches!(
            strip.source,
            LevelSource::GlobalWithOverride { .. }
        ));
        assert!(strip.is_default_sell_unit);
        assert_eq!(strip.selling_price.cents(), 299);

        // Unpriced level falls back to the shop's flat selling price.
        let boxed = levels.iter().find(|l| l.unit_name == "Box").unwrap();
        assert_eq!(boxed.selling_price.cents(), 2499);
    }

    #[tokio::test]
    async fn test_effective_view_without_inventory_uses_suggested_prices() {
        let svc = service();
        let mut info = amoxicillin();
        info.levels[0].suggested_price = Some(Money::from_cents(30));
        svc.catalog.save_packaging(info).await.unwrap();

        let levels = svc.effective_packaging("shop-b", "amox-500").await.unwrap();
        let tablet = levels.iter().find(|l| l.unit_name == "Tablet").unwrap();
        assert_eq!(tablet.selling_price.cents(), 30);
    }

    /// Override repository whose writes always fail.
    struct DownOverrideRepository;

    #[async_trait::async_trait]
    impl OverrideRepository for DownOverrideRepository {
        async fn get_set(
            &self,
            shop_id: &str,
            drug_id: &str,
        ) -> StoreResult<rxpos_core::overrides::OverrideSet> {
            Ok(rxpos_core::overrides::OverrideSet::new(shop_id, drug_id))
        }

        async fn save_set(&self, _set: rxpos_core::overrides::OverrideSet) -> StoreResult<()> {
            Err(StoreError::Repository("override store unavailable".to_string()))
        }
    }

    #[tokio::test]
    async fn test_failed_override_save_leaves_sell_unit_cache_untouched() {
        let svc = PackagingService::new(
            Arc::new(MemoryDrugCatalog::new()),
            Arc::new(DownOverrideRepository),
            Arc::new(MemoryInventoryRepository::new()),
        );
        svc.define_packaging(amoxicillin()).await.unwrap();
        svc.inventories
            .save(ShopInventory::new("shop-a", "amox-500"))
            .await
            .unwrap();

        let catalog = svc.get_packaging("amox-500").await.unwrap();
        let strip_id = catalog.level_by_name("Strip").unwrap().id.clone();
        let err = svc
            .add_override(
                ShopPackagingOverride::global("shop-a", "amox-500", &strip_id).as_default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Repository(_)));

        // The cache must not point at an override that was never stored.
        let inv = svc
            .inventories
            .get("shop-a", "amox-500")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(inv.shop_specific_sell_unit, None);
    }

    #[tokio::test]
    async fn test_unset_default_clears_inventory_cache() {
        let svc = service();
        svc.define_packaging(amoxicillin()).await.unwrap();
        svc.inventories
            .save(ShopInventory::new("shop-a", "amox-500"))
            .await
            .unwrap();

        let catalog = svc.get_packaging("amox-500").await.unwrap();
        let strip_id = catalog.level_by_name("Strip").unwrap().id.clone();
        let stored = svc
            .add_override(
                ShopPackagingOverride::global("shop-a", "amox-500", &strip_id).as_default(),
            )
            .await
            .unwrap();

        let name = svc
            .set_default_sell_unit("shop-a", "amox-500", &stored.id, false)
            .await
            .unwrap();
        assert_eq!(name, "Strip");

        let inv = svc
            .inventories
            .get("shop-a", "amox-500")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(inv.shop_specific_sell_unit, None);
    }
}
