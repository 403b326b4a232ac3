// Copyright (c) 2025 Ledgerlink Contributors.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

pub mod api;
pub mod cli;
pub mod commands;
pub mod credentials;
pub mod db;
pub mod models;
pub mod notify;
pub mod realization;
pub mod sync;
pub mod utils;
