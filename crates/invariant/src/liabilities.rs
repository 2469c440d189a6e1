//! Account and trustline liabilities follow the offers that create them.

use std::collections::BTreeMap;

use tiermark_types::{
    AccountId, Asset, ContractEvent, Entry, EntryData, FIRST_PROTOCOL_WITH_LIABILITIES,
    LedgerDelta, LedgerHeader, Liabilities, OfferEntry, Operation, OperationResult,
    ProtocolVersion,
};

use crate::{
    error::{CheckError, CheckResult, ContractViolationSnafu},
    invariant::Invariant,
};

/// Checks that every operation changes an account's liabilities in each
/// asset by exactly the change in liabilities of that account's offers, that
/// unauthorized trustlines never gain liabilities, and that balances leave
/// room for the liabilities they carry.
///
/// Non-strict.
#[derive(Debug, Clone, Copy, Default)]
pub struct LiabilitiesMatchOffers;

/// Net liability change per account and asset. Summed in `i128` since a
/// delta may touch many offers near `i64::MAX`.
type LiabilityChanges = BTreeMap<(AccountId, Asset), (i128, i128)>;

impl LiabilitiesMatchOffers {
    /// Registered name.
    pub const NAME: &'static str = "LiabilitiesMatchOffers";

    fn check_authorized(current: Option<&Entry>, previous: Option<&Entry>) -> String {
        let Some(EntryData::Trustline(trust)) = current.map(|e| &e.data) else {
            return String::new();
        };
        if trust.is_authorized() {
            return String::new();
        }
        let liabilities = trust.liabilities();
        if trust.is_authorized_to_maintain_liabilities() {
            let before = match previous.map(|e| &e.data) {
                Some(EntryData::Trustline(prev)) => prev.liabilities(),
                _ => Liabilities::default(),
            };
            if liabilities.buying > before.buying || liabilities.selling > before.selling {
                return format!(
                    "Liabilities increased on unauthorized trust line {} in {}",
                    trust.account_id, trust.asset
                );
            }
        } else if liabilities.buying > 0 || liabilities.selling > 0 {
            return format!(
                "Unauthorized trust line has liabilities {} in {}",
                trust.account_id, trust.asset
            );
        }
        String::new()
    }

    fn accumulate(
        changes: &mut LiabilityChanges,
        entry: &Entry,
        sign: i128,
    ) -> Result<(), CheckError> {
        let mut add = |account: &AccountId, asset: &Asset, buying: i128, selling: i128| {
            let slot = changes.entry((*account, asset.clone())).or_default();
            slot.0 += sign * buying;
            slot.1 += sign * selling;
        };
        match &entry.data {
            EntryData::Account(account) => {
                let l = account.liabilities();
                let (buying, selling) = (-i128::from(l.buying), -i128::from(l.selling));
                add(&account.account_id, &Asset::Native, buying, selling);
            },
            EntryData::Trustline(trust) => {
                let l = trust.liabilities();
                add(&trust.account_id, &trust.asset, -i128::from(l.buying), -i128::from(l.selling));
            },
            EntryData::Offer(offer) => {
                let l = offer_liabilities(offer)?;
                if !is_issuer(&offer.seller_id, &offer.selling) {
                    add(&offer.seller_id, &offer.selling, 0, i128::from(l.selling));
                }
                if !is_issuer(&offer.seller_id, &offer.buying) {
                    add(&offer.seller_id, &offer.buying, i128::from(l.buying), 0);
                }
            },
            _ => {},
        }
        Ok(())
    }

    fn check_balance_and_limit(
        header: &LedgerHeader,
        current: Option<&Entry>,
        previous: Option<&Entry>,
    ) -> String {
        let Some(entry) = current else {
            return String::new();
        };
        let with_liabilities = header.protocol_version.is_at_least(FIRST_PROTOCOL_WITH_LIABILITIES);
        let compatible = match &entry.data {
            EntryData::Account(account) => {
                if !should_check_account(entry, previous, header.protocol_version) {
                    return String::new();
                }
                let l = with_liabilities.then(|| account.liabilities()).unwrap_or_default();
                let minimum = i128::from(header.minimum_balance(account.num_sub_entries));
                let balance = i128::from(account.balance);
                balance >= minimum + i128::from(l.selling)
                    && i128::from(i64::MAX) - balance >= i128::from(l.buying)
            },
            EntryData::Trustline(trust) => {
                let l = with_liabilities.then(|| trust.liabilities()).unwrap_or_default();
                let balance = i128::from(trust.balance);
                balance >= i128::from(l.selling)
                    && i128::from(trust.limit) - balance >= i128::from(l.buying)
            },
            _ => true,
        };
        if compatible {
            String::new()
        } else {
            format!("Balance not compatible with liabilities for {}: {entry}", entry.key())
        }
    }
}

fn is_issuer(account: &AccountId, asset: &Asset) -> bool {
    matches!(asset, Asset::Credit { issuer, .. } if issuer == account)
}

/// Accounts are checked when created, when their balance drops, or when
/// their liabilities grow.
fn should_check_account(
    current: &Entry,
    previous: Option<&Entry>,
    version: ProtocolVersion,
) -> bool {
    let (EntryData::Account(current), Some(EntryData::Account(previous))) =
        (&current.data, previous.map(|e| &e.data))
    else {
        return true;
    };
    if current.balance < previous.balance {
        return true;
    }
    if version.is_before(FIRST_PROTOCOL_WITH_LIABILITIES) {
        return false;
    }
    let (now, before) = (current.liabilities(), previous.liabilities());
    now.selling > before.selling || now.buying > before.buying
}

/// Liabilities an offer places on its seller: the most it can sell, and the
/// most it can be paid for that, when neither side is limited.
///
/// The selling amount is rounded down and the buying amount up, so the
/// offer never pays out more than it reserved.
pub(crate) fn offer_liabilities(offer: &OfferEntry) -> Result<Liabilities, CheckError> {
    let (n, d) = (i128::from(offer.price.n), i128::from(offer.price.d));
    if n <= 0 || d <= 0 || offer.amount < 0 {
        return ContractViolationSnafu {
            message: format!(
                "offer {} has invalid price {}/{} or amount {}",
                offer.offer_id, offer.price.n, offer.price.d, offer.amount
            ),
        }
        .fail();
    }
    let max = i128::from(i64::MAX);
    let value = (i128::from(offer.amount) * n).min(max * d);
    let (selling, buying) = if n > d {
        let selling = value / n;
        (selling, (selling * n + d - 1) / d)
    } else {
        let buying = value / d;
        (buying * d / n, buying)
    };
    let to_i64 = |v: i128| {
        i64::try_from(v).map_err(|_| CheckError::ContractViolation {
            message: format!("offer {} liabilities overflow", offer.offer_id),
        })
    };
    Ok(Liabilities { buying: to_i64(buying)?, selling: to_i64(selling)? })
}

impl Invariant for LiabilitiesMatchOffers {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn is_strict(&self) -> bool {
        false
    }

    fn check_on_operation_apply(
        &self,
        _operation: &Operation,
        _result: &OperationResult,
        delta: &LedgerDelta,
        _events: &[ContractEvent],
    ) -> CheckResult {
        let header = &delta.header.current;
        if header.protocol_version.is_at_least(FIRST_PROTOCOL_WITH_LIABILITIES) {
            let mut changes = LiabilityChanges::new();
            for change in delta.entries.values() {
                let (current, previous) = (change.current.as_ref(), change.previous.as_ref());
                let unauthorized = Self::check_authorized(current, previous);
                if !unauthorized.is_empty() {
                    return Ok(unauthorized);
                }
                if let Some(entry) = current {
                    Self::accumulate(&mut changes, entry, 1)?;
                }
                if let Some(entry) = previous {
                    Self::accumulate(&mut changes, entry, -1)?;
                }
            }
            for ((account, asset), (buying, selling)) in &changes {
                if *buying != 0 {
                    return Ok(format!(
                        "Change in buying liabilities differed from change in total buying \
                         liabilities of offers by {buying} for {account} in {asset}"
                    ));
                }
                if *selling != 0 {
                    return Ok(format!(
                        "Change in selling liabilities differed from change in total selling \
                         liabilities of offers by {selling} for {account} in {asset}"
                    ));
                }
            }
        }

        for change in delta.entries.values() {
            let message = Self::check_balance_and_limit(
                header,
                change.current.as_ref(),
                change.previous.as_ref(),
            );
            if !message.is_empty() {
                return Ok(message);
            }
        }
        Ok(String::new())
    }
}
