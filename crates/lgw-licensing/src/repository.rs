use std::collections::{BTreeMap, HashMap};

use lgw_store::{ContractStore, Param, ProjectionBackend, StoreResult};
use lgw_types::{Contract, ContractId, Party};
use tracing::debug;

use crate::templates::{
    Allocation, AppInstall, AppInstallRequest, License, LicenseRenewalRequest,
    LicenseWithRenewalRequests, RenewalWithAllocation,
};

/// A renewal belongs to the license with the same number and user.
const LICENSE_RENEWAL_JOIN: &str = "prim.licenseNum = sec.licenseNum AND prim.user = sec.user";

/// An allocation funds the renewal it references, sent by the renewing user.
const RENEWAL_ALLOCATION_JOIN: &str = "prim.requestId = sec.allocation.settlement.settlementRef.id \
     AND prim.user = sec.allocation.transferLeg.sender";

/// Licensing reads over the active-contracts projection.
pub struct LicensingRepository<B: ?Sized = dyn ProjectionBackend> {
    store: ContractStore<B>,
}

impl<B: ?Sized> Clone for LicensingRepository<B> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<B: ProjectionBackend + ?Sized> LicensingRepository<B> {
    pub fn new(store: ContractStore<B>) -> Self {
        Self { store }
    }

    /// Licenses where `party` is the user or the provider, ordered by
    /// contract id, each with its pending renewals and their allocations.
    ///
    /// A renewal funded by several allocations is listed once per
    /// allocation. Renewals and allocations are read in a second query, so a
    /// renewal that left the projection in between is listed without one.
    pub async fn find_active_licenses(
        &self,
        party: &Party,
    ) -> StoreResult<Vec<LicenseWithRenewalRequests>> {
        let params = [Param::from(party), Param::from(party)];
        let rows = self
            .store
            .active_left_join_where::<License, LicenseRenewalRequest, _, _>(
                LICENSE_RENEWAL_JOIN,
                Some("user = ? OR provider = ?"),
                &params,
                |license, renewal| (license, renewal),
            )
            .await?;
        let allocations = self.allocations_by_renewal().await?;

        let mut grouped: BTreeMap<String, LicenseWithRenewalRequests> = BTreeMap::new();
        for (license, renewal) in rows {
            let entry = grouped
                .entry(license.contract_id.to_string())
                .or_insert_with(|| LicenseWithRenewalRequests {
                    license,
                    renewals: Vec::new(),
                });
            let Some(renewal) = renewal else { continue };
            match allocations.get(renewal.contract_id.as_str()) {
                Some(cids) => {
                    for cid in cids {
                        entry.renewals.push(RenewalWithAllocation {
                            renewal: renewal.clone(),
                            allocation_cid: Some(cid.clone()),
                        });
                    }
                }
                None => entry.renewals.push(RenewalWithAllocation {
                    renewal,
                    allocation_cid: None,
                }),
            }
        }
        debug!(party = %party, licenses = grouped.len(), "grouped active licenses");
        Ok(grouped.into_values().collect())
    }

    async fn allocations_by_renewal(
        &self,
    ) -> StoreResult<HashMap<String, Vec<ContractId<Allocation>>>> {
        let rows = self
            .store
            .active_left_join_where::<LicenseRenewalRequest, Allocation, _, _>(
                RENEWAL_ALLOCATION_JOIN,
                None,
                &[],
                |renewal, allocation| (renewal.contract_id, allocation.map(|a| a.contract_id)),
            )
            .await?;
        let mut out: HashMap<String, Vec<ContractId<Allocation>>> = HashMap::new();
        for (renewal, allocation) in rows {
            if let Some(cid) = allocation {
                out.entry(renewal.into_string()).or_default().push(cid);
            }
        }
        Ok(out)
    }

    pub async fn find_license_by_id(
        &self,
        contract_id: &ContractId<License>,
    ) -> StoreResult<Contract<License>> {
        self.store.by_contract_id(contract_id).await
    }

    pub async fn find_active_license_renewal_request_by_id(
        &self,
        contract_id: &ContractId<LicenseRenewalRequest>,
    ) -> StoreResult<Option<Contract<LicenseRenewalRequest>>> {
        self.store
            .single_active_where("contract_id = ?", &[contract_id.as_str().into()])
            .await
    }

    /// The allocation funding a renewal request, if the user has made one.
    pub async fn find_active_allocation_for_renewal_request(
        &self,
        contract_id: &ContractId<LicenseRenewalRequest>,
    ) -> StoreResult<Option<Contract<Allocation>>> {
        let rows = self
            .store
            .active_left_join_where::<LicenseRenewalRequest, Allocation, _, _>(
                RENEWAL_ALLOCATION_JOIN,
                Some("prim.contract_id = ?"),
                &[contract_id.as_str().into()],
                |_, allocation| allocation,
            )
            .await?;
        Ok(rows.into_iter().flatten().next())
    }

    pub async fn find_active_app_installs(&self) -> StoreResult<Vec<Contract<AppInstall>>> {
        self.store.active().await
    }

    pub async fn find_app_install_by_id(
        &self,
        contract_id: &ContractId<AppInstall>,
    ) -> StoreResult<Contract<AppInstall>> {
        self.store.by_contract_id(contract_id).await
    }

    pub async fn find_active_app_install_requests(
        &self,
    ) -> StoreResult<Vec<Contract<AppInstallRequest>>> {
        self.store.active().await
    }

    pub async fn find_app_install_request_by_id(
        &self,
        contract_id: &ContractId<AppInstallRequest>,
    ) -> StoreResult<Contract<AppInstallRequest>> {
        self.store.by_contract_id(contract_id).await
    }
}
