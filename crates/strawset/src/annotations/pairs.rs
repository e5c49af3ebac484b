// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

use super::types::InstanceAnnotation;
use std::collections::HashMap;

/// Find strawberry-peduncle pairs among the annotations of one image.
///
/// A strawberry is paired when its non-zero `parent_id` equals the
/// `instance_id` of a peduncle. Pairs keep the strawberry order of the input.
pub fn find_pairs(
    annotations: &[InstanceAnnotation],
) -> Vec<(&InstanceAnnotation, &InstanceAnnotation)> {
    let peduncles: HashMap<u32, &InstanceAnnotation> = annotations
        .iter()
        .filter(|a| a.is_peduncle())
        .map(|a| (a.instance_id, a))
        .collect();

    annotations
        .iter()
        .filter(|a| a.is_primary() && a.parent_id != 0)
        .filter_map(|straw| peduncles.get(&straw.parent_id).map(|ped| (straw, *ped)))
        .collect()
}
