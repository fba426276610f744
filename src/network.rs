// Financial network - all loaded data plus simple counts and sums
//
// "Network" here means companies + transactions with fold-style aggregates.
// No graph analytics (centrality, communities) are computed.

use crate::records::{Company, Transaction, TransactionKind};
use crate::repository::Dataset;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Borrowed view over a dataset with its aggregates
#[derive(Debug, Clone, Serialize)]
pub struct FinancialNetwork<'a> {
    pub companies: &'a [Company],
    pub transactions: &'a [Transaction],
    pub transactions_by_kind: BTreeMap<TransactionKind, usize>,
    pub total_value: f64,
    /// Distinct identifiers that appear as payer or payee
    pub active_participants: usize,
}

impl<'a> FinancialNetwork<'a> {
    pub fn build(companies: &'a [Company], transactions: &'a [Transaction]) -> Self {
        let mut transactions_by_kind: BTreeMap<TransactionKind, usize> = BTreeMap::new();
        let mut participants: HashSet<&str> = HashSet::new();
        let mut total_value = 0.0;

        for tx in transactions {
            *transactions_by_kind.entry(tx.kind.clone()).or_insert(0) += 1;
            total_value += tx.amount;
            participants.insert(tx.payer_id.as_str());
            participants.insert(tx.payee_id.as_str());
        }

        FinancialNetwork {
            companies,
            transactions,
            transactions_by_kind,
            total_value,
            active_participants: participants.len(),
        }
    }

    pub fn from_dataset(dataset: &'a Dataset) -> Self {
        Self::build(&dataset.companies, &dataset.transactions)
    }

    pub fn count_for(&self, kind: &TransactionKind) -> usize {
        self.transactions_by_kind.get(kind).copied().unwrap_or(0)
    }

    /// Owned, record-free summary for reports
    pub fn summary(&self) -> NetworkSummary {
        NetworkSummary {
            companies: self.companies.len(),
            transactions: self.transactions.len(),
            transactions_by_kind: self
                .transactions_by_kind
                .iter()
                .map(|(kind, count)| (kind.tag().to_string(), *count))
                .collect(),
            total_value: self.total_value,
            active_participants: self.active_participants,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkSummary {
    pub companies: usize,
    pub transactions: usize,
    pub transactions_by_kind: BTreeMap<String, usize>,
    pub total_value: f64,
    pub active_participants: usize,
}

impl NetworkSummary {
    pub fn from_dataset(dataset: &Dataset) -> Self {
        FinancialNetwork::from_dataset(dataset).summary()
    }
}

// ============================================================================
// PER-COMPANY FLOWS
// ============================================================================

/// Money in and out of one company
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyFlows {
    pub company_id: String,
    pub sent: f64,
    pub received: f64,
    pub outgoing: usize,
    pub incoming: usize,
    pub counterparties: usize,
}

impl CompanyFlows {
    pub fn net(&self) -> f64 {
        self.received - self.sent
    }
}

pub fn company_flows(transactions: &[Transaction], company_id: &str) -> CompanyFlows {
    let mut flows = CompanyFlows {
        company_id: company_id.to_string(),
        ..CompanyFlows::default()
    };
    let mut counterparties: HashSet<&str> = HashSet::new();

    for tx in transactions.iter().filter(|tx| tx.involves(company_id)) {
        if tx.payer_id == company_id {
            flows.sent += tx.amount;
            flows.outgoing += 1;
            counterparties.insert(tx.payee_id.as_str());
        }
        if tx.payee_id == company_id {
            flows.received += tx.amount;
            flows.incoming += 1;
            counterparties.insert(tx.payer_id.as_str());
        }
    }

    // A self-transfer is not a counterparty
    counterparties.remove(company_id);
    flows.counterparties = counterparties.len();
    flows
}
