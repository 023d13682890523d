//! Expands the configured resolutions into the ordered step sequence.

use crate::config::Config;
use crate::steps::{self, Step};

/// Build the full ordered migration plan.
///
/// The order is semantic: later steps observe every effect of earlier ones.
/// Per-resolution factories expand into one step per configured resolution,
/// in configuration order; global steps keep their place between the blocks.
pub fn plan(config: &Config) -> Vec<Step> {
    let resolutions = &config.resolutions;
    let mut sequence = Vec::new();

    for &r in resolutions {
        sequence.push(steps::create_flows_table(config, r));
    }
    for &r in resolutions {
        sequence.push(steps::add_exporter_columns(r));
    }
    sequence.push(steps::add_net_mask_columns());
    sequence.push(steps::add_net_prefix_columns());
    for &r in resolutions {
        sequence.push(steps::add_net_name_columns(r));
    }
    for &r in resolutions {
        sequence.push(steps::add_net_attribute_columns(r));
    }
    for &r in resolutions {
        sequence.push(steps::fix_order_by_country(r));
    }
    for &r in resolutions {
        sequence.push(steps::add_dst_as_path_columns(r));
    }
    sequence.push(steps::add_dst_communities_column());
    sequence.push(steps::add_dst_large_communities_column());
    for &r in resolutions {
        sequence.push(steps::add_packet_size_columns(r));
    }
    for &r in resolutions {
        sequence.push(steps::create_consumer_view(r));
    }
    for &r in resolutions {
        sequence.push(steps::set_ttl(r));
    }
    sequence.push(steps::create_exporters_view());
    sequence.push(steps::create_protocols_dictionary(config));
    sequence.push(steps::create_asns_dictionary(config));
    sequence.push(steps::create_networks_dictionary(config));
    sequence.push(steps::create_raw_table(config));
    sequence.push(steps::create_raw_consumer_view(config));
    sequence.push(steps::create_raw_errors_view(config));

    sequence
}
