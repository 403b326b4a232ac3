// Copyright (c) 2025 Ledgerlink Contributors.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

pub mod budgets;
pub mod doctor;
pub mod entities;
pub mod exporter;
pub mod oauth;
pub mod realization;
pub mod syncer;
pub mod watch;
