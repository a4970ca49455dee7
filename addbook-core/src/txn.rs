//! Provisioning transaction builder
//!
//! Assembles the ordered write batch for one new contact: identity
//! first, then name, phone, and group membership, each back-referencing
//! the identity op. Pure construction; applying the batch is the
//! store's job.

use serde::{Deserialize, Serialize};

use crate::partition::Partition;
use crate::store::{fields, mimetypes, RecordTarget, WriteOp, PHONE_TYPE_MOBILE};

/// Index of the identity op that all attribute ops back-reference.
const IDENTITY_OP: usize = 0;

/// The four-op atomic batch that provisions one contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningTransaction {
    ops: Vec<WriteOp>,
}

impl ProvisioningTransaction {
    /// Build the batch for a validated (name, phone) pair and a
    /// resolved partition.
    ///
    /// Op order is load-bearing: the identity insert must precede every
    /// back-referencing attribute insert.
    pub fn build(name: &str, phone: &str, partition: &Partition) -> Self {
        let ops = vec![
            // 1. create the identity, owned by the partition's account
            WriteOp::insert(RecordTarget::Identity)
                .with_value(fields::ACCOUNT_TYPE, &partition.account_type)
                .with_value(fields::ACCOUNT_NAME, &partition.account_name),
            // 2. attach the display name
            WriteOp::insert(RecordTarget::Attribute)
                .with_back_reference(IDENTITY_OP)
                .with_value(fields::MIMETYPE, mimetypes::STRUCTURED_NAME)
                .with_value(fields::DISPLAY_NAME, name),
            // 3. attach the phone number, tagged mobile
            WriteOp::insert(RecordTarget::Attribute)
                .with_back_reference(IDENTITY_OP)
                .with_value(fields::MIMETYPE, mimetypes::PHONE)
                .with_value(fields::PHONE_NUMBER, phone)
                .with_value(fields::PHONE_TYPE, PHONE_TYPE_MOBILE),
            // 4. attach membership in the partition's group
            WriteOp::insert(RecordTarget::Attribute)
                .with_back_reference(IDENTITY_OP)
                .with_value(fields::GROUP_ID, &partition.group_id)
                .with_value(fields::MIMETYPE, mimetypes::GROUP_MEMBERSHIP),
        ];

        Self { ops }
    }

    /// The ordered ops to hand to the store's atomic batch apply.
    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }
}
