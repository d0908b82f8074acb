//! Recipients and the per-role address book.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single mailbox: an address with an optional display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Address {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: None,
        }
    }

    pub fn with_name(address: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: Some(name.into()),
        }
    }

    /// Loose containment: an unnamed query matches on address alone, a named
    /// query must match both address and name.
    pub fn matches(&self, address: &str, name: Option<&str>) -> bool {
        self.address == address && name.map_or(true, |n| self.name.as_deref() == Some(n))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name} <{}>", self.address),
            None => f.write_str(&self.address),
        }
    }
}

impl From<&str> for Address {
    fn from(address: &str) -> Self {
        Address::new(address)
    }
}

impl From<String> for Address {
    fn from(address: String) -> Self {
        Address::new(address)
    }
}

impl<A: Into<String>, N: Into<String>> From<(A, N)> for Address {
    fn from((address, name): (A, N)) -> Self {
        Address::with_name(address, name)
    }
}

/// Values that carry a mail address of their own, such as a user record.
///
/// ```ignore
/// impl Addressable for User {
///     fn mail_address(&self) -> Address {
///         Address::with_name(&self.email, &self.name)
///     }
/// }
///
/// mail.to(&user);
/// ```
pub trait Addressable {
    fn mail_address(&self) -> Address;
}

impl Addressable for Address {
    fn mail_address(&self) -> Address {
        self.clone()
    }
}

/// Anything that can be normalized into zero or more recipients.
pub trait IntoRecipients {
    fn into_recipients(self) -> Vec<Address>;
}

impl IntoRecipients for Address {
    fn into_recipients(self) -> Vec<Address> {
        vec![self]
    }
}

impl IntoRecipients for &str {
    fn into_recipients(self) -> Vec<Address> {
        vec![Address::new(self)]
    }
}

impl IntoRecipients for String {
    fn into_recipients(self) -> Vec<Address> {
        vec![Address::new(self)]
    }
}

impl IntoRecipients for &String {
    fn into_recipients(self) -> Vec<Address> {
        vec![Address::new(self.as_str())]
    }
}

impl<A: Into<String>, N: Into<String>> IntoRecipients for (A, N) {
    fn into_recipients(self) -> Vec<Address> {
        vec![Address::from(self)]
    }
}

impl<T: Addressable + ?Sized> IntoRecipients for &T {
    fn into_recipients(self) -> Vec<Address> {
        vec![self.mail_address()]
    }
}

impl<T: IntoRecipients> IntoRecipients for Vec<T> {
    fn into_recipients(self) -> Vec<Address> {
        self.into_iter().flat_map(IntoRecipients::into_recipients).collect()
    }
}

impl<T: IntoRecipients, const N: usize> IntoRecipients for [T; N] {
    fn into_recipients(self) -> Vec<Address> {
        self.into_iter().flat_map(IntoRecipients::into_recipients).collect()
    }
}

/// Address roles on a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    From,
    ReplyTo,
    To,
    Cc,
    Bcc,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::From => write!(f, "from"),
            Self::ReplyTo => write!(f, "reply-to"),
            Self::To => write!(f, "to"),
            Self::Cc => write!(f, "cc"),
            Self::Bcc => write!(f, "bcc"),
        }
    }
}

/// Recipients of a message, grouped by role.
///
/// `from` and `reply_to` hold a single mailbox (last write wins). The
/// recipient roles are ordered lists; every `add` de-duplicates the list by
/// address and display name together, keeping the most recent entry in that
/// entry's position. The same address under two names is two recipients.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressBook {
    #[serde(default)]
    pub from: Option<Address>,
    #[serde(default)]
    pub reply_to: Option<Address>,
    #[serde(default)]
    pub to: Vec<Address>,
    #[serde(default)]
    pub cc: Vec<Address>,
    #[serde(default)]
    pub bcc: Vec<Address>,
}

impl AddressBook {
    /// Overwrite a single-valued role. Recipient roles get the address
    /// appended instead.
    pub fn set_single(&mut self, role: Role, address: Address) {
        match role {
            Role::From => self.from = Some(address),
            Role::ReplyTo => self.reply_to = Some(address),
            Role::To | Role::Cc | Role::Bcc => self.add(role, address),
        }
    }

    /// Append recipients to a role, then drop earlier entries whose address
    /// and name reappear.
    pub fn add(&mut self, role: Role, input: impl IntoRecipients) {
        let recipients = input.into_recipients();
        let list = match role {
            Role::To => &mut self.to,
            Role::Cc => &mut self.cc,
            Role::Bcc => &mut self.bcc,
            Role::From | Role::ReplyTo => {
                if let Some(last) = recipients.into_iter().last() {
                    self.set_single(role, last);
                }
                return;
            }
        };

        list.extend(recipients);
        dedup_keep_last(list);
    }

    pub fn has(&self, role: Role, address: &str, name: Option<&str>) -> bool {
        self.get(role).iter().any(|a| a.matches(address, name))
    }

    pub fn get(&self, role: Role) -> &[Address] {
        match role {
            Role::From => self.from.as_slice(),
            Role::ReplyTo => self.reply_to.as_slice(),
            Role::To => &self.to,
            Role::Cc => &self.cc,
            Role::Bcc => &self.bcc,
        }
    }

    /// Every stored mailbox with its role, in application order.
    pub fn iter(&self) -> impl Iterator<Item = (Role, &Address)> {
        [Role::From, Role::ReplyTo, Role::To, Role::Cc, Role::Bcc]
            .into_iter()
            .flat_map(move |role| self.get(role).iter().map(move |a| (role, a)))
    }
}

fn dedup_keep_last(list: &mut Vec<Address>) {
    let mut kept: Vec<Address> = Vec::with_capacity(list.len());
    for address in list.drain(..).rev() {
        if !kept.iter().any(|k| k.address == address.address && k.name == address.name) {
            kept.push(address);
        }
    }
    kept.reverse();
    *list = kept;
}
