use crate::configuration::{RetrieveBound, WorkloadSpec};
use crate::template::TemplateKind;

pub fn get_contact_node_uri() -> String {
    std::env::var("SCYLLA_URI").unwrap_or_else(|_| "127.0.0.1:9042".to_string())
}

pub fn spec_with(
    num_ops: u64,
    percent_create: u64,
    percent_update: u64,
    percent_delete: u64,
    start_seq_num: u64,
) -> WorkloadSpec {
    WorkloadSpec {
        num_ops,
        percent_create,
        percent_update,
        percent_delete,
        start_seq_num,
        key_prefix: "doc_".to_string(),
        key_suffix: String::new(),
        template: TemplateKind::Person,
        template_name: "Person".to_string(),
        data_file: None,
        doc_size: 500,
        expiry: None,
        shuffle: false,
        transactional: false,
        fields_to_update: Vec::new(),
        secondary_sync: None,
        output: false,
        retrieve_bound: RetrieveBound::Legacy,
    }
}
