mod support;

mod crawl_tests;
mod fetcher_tests;
