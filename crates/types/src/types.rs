//! Core type definitions for Tiermark.
//!
//! These types model the ledger entries that live in the two storage tiers:
//! - Identifier types (AccountId, ContractId, OfferId, ...)
//! - Entry keys with a fixed cross-type ordering
//! - Entry values, including the TTL records that govern Soroban entries

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::hash::{Hash, entry_key_hash, short_hex, to_hex};

// ============================================================================
// Identifier Types
// ============================================================================

/// Generates a newtype wrapper around a numeric type for type-safe identifiers.
///
/// Each generated type provides:
/// - Standard derives: Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord
/// - Serde with `#[serde(transparent)]` for wire format compatibility
/// - `From<inner>` and `Into<inner>` conversions
/// - `Display` with a semantic prefix (e.g., `offer:123`)
/// - `new()` constructor and `value()` accessor
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident, $inner:ty, $prefix:expr
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
            Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name($inner);

        impl $name {
            /// Creates a new identifier from a raw value.
            #[inline]
            pub const fn new(value: $inner) -> Self {
                Self(value)
            }

            /// Returns the raw numeric value.
            #[inline]
            pub const fn value(self) -> $inner {
                self.0
            }
        }

        impl From<$inner> for $name {
            #[inline]
            fn from(value: $inner) -> Self {
                Self(value)
            }
        }

        impl From<$name> for $inner {
            #[inline]
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}:{}", $prefix, self.0)
            }
        }
    };
}

/// Generates a newtype wrapper around a 32-byte hash-like identifier.
///
/// Displays as `prefix:` followed by the first four bytes in hex.
macro_rules! define_hash_id {
    (
        $(#[$meta:meta])*
        $name:ident, $prefix:expr
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
            Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(Hash);

        impl $name {
            /// Creates a new identifier from raw bytes.
            #[inline]
            pub const fn new(bytes: Hash) -> Self {
                Self(bytes)
            }

            /// Returns the raw identifier bytes.
            #[inline]
            pub const fn as_bytes(&self) -> &Hash {
                &self.0
            }
        }

        impl From<Hash> for $name {
            #[inline]
            fn from(bytes: Hash) -> Self {
                Self(bytes)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}:{}", $prefix, short_hex(&self.0))
            }
        }
    };
}

define_hash_id!(
    /// Account identifier (the account's public key).
    ///
    /// # Display
    ///
    /// Formats with `account:` prefix and a short hex tail: `account:0a1b2c3d`.
    AccountId, "account"
);

define_hash_id!(
    /// Smart contract instance identifier.
    ///
    /// # Display
    ///
    /// Formats with `contract:` prefix: `contract:0a1b2c3d`.
    ContractId, "contract"
);

define_hash_id!(
    /// Claimable balance identifier.
    ///
    /// # Display
    ///
    /// Formats with `balance:` prefix: `balance:0a1b2c3d`.
    ClaimableBalanceId, "balance"
);

define_id!(
    /// Offer identifier, unique per ledger.
    ///
    /// # Display
    ///
    /// Formats with `offer:` prefix: `offer:42`.
    OfferId, i64, "offer"
);

/// Asset held in a trustline or traded in an offer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Asset {
    /// The ledger's native currency.
    Native,
    /// An issued credit asset.
    Credit {
        /// Asset code (1-12 characters).
        code: String,
        /// Issuing account.
        issuer: AccountId,
    },
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Asset::Native => write!(f, "native"),
            Asset::Credit { code, issuer } => write!(f, "{code}/{issuer}"),
        }
    }
}

// ============================================================================
// Entry Keys
// ============================================================================

/// Lifetime class of a contract data entry.
///
/// Persistent entries move to the archive when they expire and are
/// evicted. Temporary entries are deleted outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Durability {
    /// Deleted on expiry; never archived, never restorable.
    Temporary,
    /// Archived on eviction; restorable.
    Persistent,
}

/// Discriminant of an entry or key, in cross-type ordering order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntryType {
    /// Account root entry.
    Account,
    /// Trustline to an issued asset.
    Trustline,
    /// Order book offer.
    Offer,
    /// Account data entry.
    Data,
    /// Claimable balance.
    ClaimableBalance,
    /// Contract storage entry.
    ContractData,
    /// Contract executable code.
    ContractCode,
    /// Time-to-live record for a contract data/code entry.
    Ttl,
}

impl EntryType {
    /// Stable lowercase name, used as a metric and log label.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Account => "account",
            Self::Trustline => "trustline",
            Self::Offer => "offer",
            Self::Data => "data",
            Self::ClaimableBalance => "claimable_balance",
            Self::ContractData => "contract_data",
            Self::ContractCode => "contract_code",
            Self::Ttl => "ttl",
        }
    }
}

/// Typed identifier of a ledger entry.
///
/// The derived `Ord` (variant order first, then fields) is the fixed
/// cross-type ordering used for sorted merge-scans over both tiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntryKey {
    /// Account root.
    Account {
        /// Account identifier.
        account_id: AccountId,
    },
    /// Trustline of an account to an asset.
    Trustline {
        /// Holding account.
        account_id: AccountId,
        /// Trusted asset.
        asset: Asset,
    },
    /// Offer on the order book.
    Offer {
        /// Seller account.
        seller_id: AccountId,
        /// Offer identifier.
        offer_id: OfferId,
    },
    /// Named data attached to an account.
    Data {
        /// Owning account.
        account_id: AccountId,
        /// Data entry name.
        name: String,
    },
    /// Claimable balance.
    ClaimableBalance {
        /// Balance identifier.
        balance_id: ClaimableBalanceId,
    },
    /// Contract storage slot.
    ContractData {
        /// Owning contract.
        contract: ContractId,
        /// Storage key bytes.
        key: Vec<u8>,
        /// Lifetime class.
        durability: Durability,
    },
    /// Contract code blob, addressed by its hash.
    ContractCode {
        /// SHA-256 of the code.
        hash: Hash,
    },
    /// TTL record, addressed by the hash of its owner's key.
    Ttl {
        /// [`entry_key_hash`] of the owning key.
        key_hash: Hash,
    },
}

impl EntryKey {
    /// Returns the entry type of this key.
    pub const fn entry_type(&self) -> EntryType {
        match self {
            Self::Account { .. } => EntryType::Account,
            Self::Trustline { .. } => EntryType::Trustline,
            Self::Offer { .. } => EntryType::Offer,
            Self::Data { .. } => EntryType::Data,
            Self::ClaimableBalance { .. } => EntryType::ClaimableBalance,
            Self::ContractData { .. } => EntryType::ContractData,
            Self::ContractCode { .. } => EntryType::ContractCode,
            Self::Ttl { .. } => EntryType::Ttl,
        }
    }

    /// Whether this key names a TTL record.
    pub const fn is_ttl(&self) -> bool {
        matches!(self, Self::Ttl { .. })
    }

    /// Whether this key is governed by a TTL record (contract data or code).
    pub const fn has_ttl(&self) -> bool {
        matches!(self, Self::ContractData { .. } | Self::ContractCode { .. })
    }

    /// Whether this key names a persistent entry.
    ///
    /// Contract code is always persistent.
    pub const fn is_persistent(&self) -> bool {
        matches!(
            self,
            Self::ContractCode { .. }
                | Self::ContractData { durability: Durability::Persistent, .. }
        )
    }

    /// Whether this key names a temporary entry.
    pub const fn is_temporary(&self) -> bool {
        matches!(self, Self::ContractData { durability: Durability::Temporary, .. })
    }

    /// Derives the key of the TTL record governing this entry.
    ///
    /// Returns `None` for keys that are not TTL-governed.
    pub fn ttl_key(&self) -> Option<EntryKey> {
        self.has_ttl().then(|| EntryKey::Ttl { key_hash: entry_key_hash(self) })
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Account { account_id } => write!(f, "account({account_id})"),
            Self::Trustline { account_id, asset } => write!(f, "trustline({account_id}, {asset})"),
            Self::Offer { seller_id, offer_id } => write!(f, "offer({seller_id}, {offer_id})"),
            Self::Data { account_id, name } => write!(f, "data({account_id}, {name:?})"),
            Self::ClaimableBalance { balance_id } => write!(f, "claimable_balance({balance_id})"),
            Self::ContractData { contract, key, durability } => {
                let durability = match durability {
                    Durability::Temporary => "temporary",
                    Durability::Persistent => "persistent",
                };
                write!(f, "contract_data({contract}, key=0x{}, {durability})", to_hex(key))
            },
            Self::ContractCode { hash } => write!(f, "contract_code({})", short_hex(hash)),
            Self::Ttl { key_hash } => write!(f, "ttl({})", to_hex(key_hash)),
        }
    }
}

// ============================================================================
// Entries
// ============================================================================

/// Amounts an account or trustline has committed to open offers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Liabilities {
    /// Amount the holder has offered to buy.
    pub buying: i64,
    /// Amount the holder has offered to sell.
    pub selling: i64,
}

/// Account root entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountEntry {
    /// Account identifier.
    pub account_id: AccountId,
    /// Native balance.
    pub balance: i64,
    /// Current sequence number.
    pub seq_num: i64,
    /// Trustlines, offers and data entries owned by the account.
    pub num_sub_entries: u32,
    /// Native liabilities; `None` for accounts that predate liabilities.
    pub liabilities: Option<Liabilities>,
}

impl AccountEntry {
    /// Liabilities, zero when absent.
    pub fn liabilities(&self) -> Liabilities {
        self.liabilities.unwrap_or_default()
    }
}

/// Trustline flag: the holder may send, receive and trade the asset.
pub const TRUSTLINE_AUTHORIZED_FLAG: u32 = 0x1;

/// Trustline flag: the holder may only maintain existing liabilities.
pub const TRUSTLINE_AUTHORIZED_TO_MAINTAIN_LIABILITIES_FLAG: u32 = 0x2;

/// Trustline entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustlineEntry {
    /// Holding account.
    pub account_id: AccountId,
    /// Trusted asset.
    pub asset: Asset,
    /// Current balance.
    pub balance: i64,
    /// Maximum balance.
    pub limit: i64,
    /// Authorization flags.
    pub flags: u32,
    /// Liabilities in `asset`; `None` for trustlines that predate liabilities.
    pub liabilities: Option<Liabilities>,
}

impl TrustlineEntry {
    /// Liabilities, zero when absent.
    pub fn liabilities(&self) -> Liabilities {
        self.liabilities.unwrap_or_default()
    }

    /// Whether the trustline is fully authorized.
    pub const fn is_authorized(&self) -> bool {
        self.flags & TRUSTLINE_AUTHORIZED_FLAG != 0
    }

    /// Whether the trustline may at least keep its existing liabilities.
    pub const fn is_authorized_to_maintain_liabilities(&self) -> bool {
        self.flags & (TRUSTLINE_AUTHORIZED_FLAG | TRUSTLINE_AUTHORIZED_TO_MAINTAIN_LIABILITIES_FLAG)
            != 0
    }
}

/// Offer price as the ratio `n / d` of buying to selling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Numerator.
    pub n: i32,
    /// Denominator.
    pub d: i32,
}

/// Offer entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferEntry {
    /// Seller account.
    pub seller_id: AccountId,
    /// Offer identifier.
    pub offer_id: OfferId,
    /// Asset being sold.
    pub selling: Asset,
    /// Asset being bought.
    pub buying: Asset,
    /// Amount of `selling` offered.
    pub amount: i64,
    /// Price of one unit of `selling` in units of `buying`.
    pub price: Price,
}

/// Account data entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataEntry {
    /// Owning account.
    pub account_id: AccountId,
    /// Entry name.
    pub name: String,
    /// Entry value.
    pub value: Vec<u8>,
}

/// Claimable balance entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimableBalanceEntry {
    /// Balance identifier.
    pub balance_id: ClaimableBalanceId,
    /// Claimable amount.
    pub amount: i64,
}

/// Contract storage entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractDataEntry {
    /// Owning contract.
    pub contract: ContractId,
    /// Storage key bytes.
    pub key: Vec<u8>,
    /// Lifetime class.
    pub durability: Durability,
    /// Stored value bytes.
    pub val: Vec<u8>,
}

/// Contract code entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractCodeEntry {
    /// SHA-256 of the code.
    pub hash: Hash,
    /// Executable bytes.
    pub code: Vec<u8>,
}

/// Time-to-live record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TtlEntry {
    /// [`entry_key_hash`] of the owning key.
    pub key_hash: Hash,
    /// Last ledger sequence at which the owner is live.
    pub live_until_ledger: u32,
}

impl TtlEntry {
    /// Whether the owner is live at ledger `seq`.
    ///
    /// An entry is live through `live_until_ledger` inclusive and expired
    /// from `live_until_ledger + 1` onward.
    #[inline]
    pub const fn is_live(&self, seq: u32) -> bool {
        self.live_until_ledger >= seq
    }
}

/// Value payload of a ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryData {
    /// Account root.
    Account(AccountEntry),
    /// Trustline.
    Trustline(TrustlineEntry),
    /// Offer.
    Offer(OfferEntry),
    /// Account data.
    Data(DataEntry),
    /// Claimable balance.
    ClaimableBalance(ClaimableBalanceEntry),
    /// Contract storage.
    ContractData(ContractDataEntry),
    /// Contract code.
    ContractCode(ContractCodeEntry),
    /// TTL record.
    Ttl(TtlEntry),
}

/// Entry extension.
///
/// The apply path may rewrite this alongside the data, so restore checks
/// compare it separately from the data payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryExt {
    /// No extension.
    #[default]
    V0,
    /// Sponsorship extension.
    V1 {
        /// Sponsoring account, if any.
        sponsor: Option<AccountId>,
    },
}

/// A ledger entry: its value at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Ledger sequence at which this entry was last modified.
    pub last_modified_ledger: u32,
    /// Value payload.
    pub data: EntryData,
    /// Extension.
    pub ext: EntryExt,
}

impl Entry {
    /// Creates an entry with no extension.
    pub fn new(data: EntryData, last_modified_ledger: u32) -> Self {
        Self { last_modified_ledger, data, ext: EntryExt::V0 }
    }

    /// Creates the TTL record for `owner`.
    ///
    /// Returns `None` if `owner` is not TTL-governed.
    pub fn ttl_for(
        owner: &EntryKey,
        live_until_ledger: u32,
        last_modified_ledger: u32,
    ) -> Option<Self> {
        match owner.ttl_key()? {
            EntryKey::Ttl { key_hash } => Some(Self::new(
                EntryData::Ttl(TtlEntry { key_hash, live_until_ledger }),
                last_modified_ledger,
            )),
            _ => None,
        }
    }

    /// Derives this entry's key.
    pub fn key(&self) -> EntryKey {
        match &self.data {
            EntryData::Account(a) => EntryKey::Account { account_id: a.account_id },
            EntryData::Trustline(t) => {
                EntryKey::Trustline { account_id: t.account_id, asset: t.asset.clone() }
            },
            EntryData::Offer(o) => EntryKey::Offer { seller_id: o.seller_id, offer_id: o.offer_id },
            EntryData::Data(d) => EntryKey::Data { account_id: d.account_id, name: d.name.clone() },
            EntryData::ClaimableBalance(c) => {
                EntryKey::ClaimableBalance { balance_id: c.balance_id }
            },
            EntryData::ContractData(c) => EntryKey::ContractData {
                contract: c.contract,
                key: c.key.clone(),
                durability: c.durability,
            },
            EntryData::ContractCode(c) => EntryKey::ContractCode { hash: c.hash },
            EntryData::Ttl(t) => EntryKey::Ttl { key_hash: t.key_hash },
        }
    }

    /// Returns the entry type.
    pub fn entry_type(&self) -> EntryType {
        match &self.data {
            EntryData::Account(_) => EntryType::Account,
            EntryData::Trustline(_) => EntryType::Trustline,
            EntryData::Offer(_) => EntryType::Offer,
            EntryData::Data(_) => EntryType::Data,
            EntryData::ClaimableBalance(_) => EntryType::ClaimableBalance,
            EntryData::ContractData(_) => EntryType::ContractData,
            EntryData::ContractCode(_) => EntryType::ContractCode,
            EntryData::Ttl(_) => EntryType::Ttl,
        }
    }

    /// Returns the TTL payload if this is a TTL record.
    pub fn as_ttl(&self) -> Option<&TtlEntry> {
        match &self.data {
            EntryData::Ttl(ttl) => Some(ttl),
            _ => None,
        }
    }

    /// Whether this entry is a persistent contract data/code entry.
    pub fn is_persistent(&self) -> bool {
        match &self.data {
            EntryData::ContractCode(_) => true,
            EntryData::ContractData(c) => c.durability == Durability::Persistent,
            _ => false,
        }
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{key: {}, last_modified: {}, ", self.key(), self.last_modified_ledger)?;
        match &self.data {
            EntryData::Account(a) => write!(f, "balance: {}, seq: {}", a.balance, a.seq_num)?,
            EntryData::Trustline(t) => write!(f, "balance: {}, limit: {}", t.balance, t.limit)?,
            EntryData::Offer(o) => write!(
                f,
                "selling: {}, buying: {}, amount: {}, price: {}/{}",
                o.selling, o.buying, o.amount, o.price.n, o.price.d
            )?,
            EntryData::Data(d) => write!(f, "value: 0x{}", to_hex(&d.value))?,
            EntryData::ClaimableBalance(c) => write!(f, "amount: {}", c.amount)?,
            EntryData::ContractData(c) => write!(f, "val: 0x{}", to_hex(&c.val))?,
            EntryData::ContractCode(c) => write!(f, "code_len: {}", c.code.len())?,
            EntryData::Ttl(t) => write!(f, "live_until: {}", t.live_until_ledger)?,
        }
        match &self.ext {
            EntryExt::V0 => write!(f, "}}"),
            EntryExt::V1 { sponsor: Some(sponsor) } => write!(f, ", sponsor: {sponsor}}}"),
            EntryExt::V1 { sponsor: None } => write!(f, ", ext: v1}}"),
        }
    }
}

/// A record in the archive tier.
///
/// Besides archived entries, an archive may carry a marker for a key that
/// was restored to live state since it was archived. Markers are not
/// archived state and are filtered out of batched lookups by consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArchiveEntry {
    /// A persistent entry evicted from live state.
    Archived(Entry),
    /// Key restored to live state after being archived.
    Live(EntryKey),
}

impl ArchiveEntry {
    /// Returns the key this record refers to.
    pub fn key(&self) -> EntryKey {
        match self {
            Self::Archived(entry) => entry.key(),
            Self::Live(key) => key.clone(),
        }
    }

    /// Returns the archived entry, if this is not a restoration marker.
    pub fn archived(&self) -> Option<&Entry> {
        match self {
            Self::Archived(entry) => Some(entry),
            Self::Live(_) => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use super::*;

    fn contract(durability: Durability) -> ContractDataEntry {
        ContractDataEntry {
            contract: ContractId::new([3u8; 32]),
            key: vec![0xca, 0xfe],
            durability,
            val: vec![1],
        }
    }

    #[test]
    fn test_cross_type_ordering_follows_variant_order() {
        let account = EntryKey::Account { account_id: AccountId::new([0xff; 32]) };
        let code = EntryKey::ContractCode { hash: [0u8; 32] };
        let ttl = EntryKey::Ttl { key_hash: [0u8; 32] };
        assert!(account < code);
        assert!(code < ttl);
        assert!(account.entry_type() < ttl.entry_type());
    }

    #[test]
    fn test_persistence_classification() {
        let persistent = Entry::new(EntryData::ContractData(contract(Durability::Persistent)), 1);
        let temporary = Entry::new(EntryData::ContractData(contract(Durability::Temporary)), 1);
        let code = EntryKey::ContractCode { hash: [1u8; 32] };
        let account = EntryKey::Account { account_id: AccountId::new([1u8; 32]) };

        assert!(persistent.key().is_persistent());
        assert!(persistent.is_persistent());
        assert!(temporary.key().is_temporary());
        assert!(!temporary.is_persistent());
        assert!(code.is_persistent());
        assert!(!account.is_persistent());
        assert!(!account.is_temporary());
    }

    #[test]
    fn test_ttl_key_only_for_soroban_entries() {
        let account = EntryKey::Account { account_id: AccountId::new([1u8; 32]) };
        assert!(account.ttl_key().is_none());

        let data = Entry::new(EntryData::ContractData(contract(Durability::Temporary)), 1).key();
        let ttl_key = data.ttl_key().expect("contract data has a ttl");
        assert!(ttl_key.is_ttl());
        assert!(ttl_key.ttl_key().is_none(), "ttl records are not themselves ttl-governed");
    }

    #[test]
    fn test_ttl_for_points_back_at_owner() {
        let owner = EntryKey::ContractCode { hash: [9u8; 32] };
        let ttl = Entry::ttl_for(&owner, 100, 5).expect("code has a ttl");
        assert_eq!(ttl.key(), owner.ttl_key().expect("ttl key"));
        assert_eq!(ttl.as_ttl().map(|t| t.live_until_ledger), Some(100));
    }

    #[test]
    fn test_is_live_boundary() {
        let ttl = TtlEntry { key_hash: [0u8; 32], live_until_ledger: 10 };
        assert!(ttl.is_live(9));
        assert!(ttl.is_live(10));
        assert!(!ttl.is_live(11));
    }

    #[test]
    fn test_archive_entry_accessors() {
        let entry = Entry::new(EntryData::ContractData(contract(Durability::Persistent)), 4);
        let archived = ArchiveEntry::Archived(entry.clone());
        let marker = ArchiveEntry::Live(entry.key());

        assert_eq!(archived.key(), marker.key());
        assert_eq!(archived.archived(), Some(&entry));
        assert_eq!(marker.archived(), None);
    }

    #[test]
    fn test_display_embeds_key_and_value() {
        let entry = Entry::new(EntryData::ContractData(contract(Durability::Persistent)), 4);
        let rendered = entry.to_string();
        assert!(rendered.contains("contract_data(contract:03030303, key=0xcafe, persistent)"));
        assert!(rendered.contains("last_modified: 4"));
        assert!(rendered.contains("val: 0x01"));
    }

    #[test]
    fn test_offer_id_display() {
        assert_eq!(OfferId::new(42).to_string(), "offer:42");
        assert_eq!(i64::from(OfferId::from(7)), 7);
    }
}
